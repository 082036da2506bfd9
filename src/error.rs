use thiserror::Error;

/// Failures surfaced by the client.
///
/// The portal returns HTTP 200 even on logical failures, so most of these
/// are detected from page content rather than status codes.
#[derive(Error, Debug)]
pub enum Error {
    /// Login rejected, or the account JSON could not be read.
    #[error("authentication failed: {0}")]
    Auth(anyhow::Error),

    /// The anti-forgery token was not found in the page; the login likely
    /// failed upstream of detection.
    #[error("unable to find bchydroparam; likely failed to login")]
    Param,

    /// The portal rendered an alert/error banner. Carries the banner text.
    #[error("portal displayed an alert dialog: {0}")]
    AlertDialog(String),

    /// The HTML page could not be parsed or validated at all.
    #[error("unable to parse the returned HTML")]
    InvalidHtml,

    /// The consumption response is not well-formed XML.
    #[error("consumption response is not well-formed XML")]
    InvalidXml(#[from] roxmltree::Error),

    /// The XML is well-formed but the expected structure is absent.
    #[error("consumption XML is missing the expected {0} element")]
    InvalidData(&'static str),

    /// The consumption request landed somewhere unexpected. Triggers one
    /// re-authenticate-and-retry cycle before surfacing an error.
    #[error("session appears to have expired: {0}")]
    SessionExpired(&'static str),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "browser")]
    #[error("browser driver error: {0}")]
    Browser(String),
}
