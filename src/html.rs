//! The one deliberately narrow seam onto the portal's page structure. All
//! DOM scraping lives here so the brittle selectors are swappable and
//! testable in isolation.

use scraper::{Html, Selector};

use crate::error::Error;

/// What the session layer needs to know about a returned portal page.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub token: String,
    pub has_account_list: bool,
}

/// Parse `html` and validate it: no alert banner rendered, anti-forgery
/// token present. The portal returns HTTP 200 even on logical failures, so
/// an alert banner is the primary signal that credentials were rejected or
/// an account needs attention.
pub fn validate_page(html: &str) -> Result<PageInfo, Error> {
    let document = Html::parse_document(html);

    if let Some(text) = find_alert_text(&document)? {
        return Err(Error::AlertDialog(text));
    }

    Ok(PageInfo {
        token: extract_anti_forgery_token(&document)?,
        has_account_list: has_account_list(&document)?,
    })
}

/// Extract the `bchydroparam` value from page HTML for use on subsequent
/// requests. The param often appears twice: a hidden `<input />` and a
/// `<span />` with an id. The `<input />` appears more reliably than the
/// `<span />`, so it is checked first. This seems to be a CSRF token,
/// though it isn't confirmed as such.
pub fn extract_anti_forgery_token(document: &Html) -> Result<String, Error> {
    let input = selector(r#"input[name="bchydroparam"]"#)?;
    if let Some(element) = document.select(&input).next() {
        if let Some(value) = element.value().attr("value") {
            return Ok(value.to_string());
        }
    }

    let span = selector("span#bchydroparam")?;
    if let Some(element) = document.select(&span).next() {
        return Ok(element.text().collect::<String>().trim().to_string());
    }

    Err(Error::Param)
}

/// Text of the first element carrying an alert/error class, if any.
pub fn find_alert_text(document: &Html) -> Result<Option<String>, Error> {
    let alerts = selector(".alert, .error")?;
    Ok(document
        .select(&alerts)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string()))
}

/// Marker present when the login redirected to a list of linked accounts
/// (eg. after a move).
pub fn has_account_list(document: &Html) -> Result<bool, Error> {
    let marker = selector("div.accountListDiv")?;
    Ok(document.select(&marker).next().is_some())
}

fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|_| Error::InvalidHtml)
}
