#[macro_use]
extern crate log;

pub mod cache;
pub mod client;
pub mod driver;
pub mod error;
pub mod html;
pub mod models;
pub mod session;
pub mod settings;
pub mod table;
pub mod xml;

#[cfg(feature = "browser")]
pub mod browser;

use chrono_tz::Tz;

pub use client::BchydroClient;
pub use driver::UsageDriver;
pub use error::Error;
pub use models::*;
pub use session::HttpDriver;
pub use settings::Settings;

// Customized user agent for getting the attention of BCHydro devs
pub const USER_AGENT: &str = r#"https://github.com/emcniece/bchydro#disclaimer"#;

// Main login page. Several redirects follow.
pub const URL_POST_LOGIN: &str = r#"https://app.bchydro.com/sso/UI/Login"#;

// Goto URL that gets appended to the initial URL_POST_LOGIN request
pub const URL_LOGIN_GOTO: &str = r#"https://app.bchydro.com:443/BCHCustomerPortal/web/login.html"#;

pub const URL_GET_ACCOUNTS: &str = r#"https://app.bchydro.com/BCHCustomerPortal/web/getAccounts.html"#;
pub const URL_ACCOUNTS_OVERVIEW: &str =
    r#"https://app.bchydro.com/BCHCustomerPortal/web/accountsOverview.html"#;

// This GET endpoint returns JSON account details.
pub const URL_GET_ACCOUNT_JSON: &str = r#"https://app.bchydro.com/evportlet/web/global-data.html"#;

// This consumption URL has more detail than the chart endpoints but needs
// different form fields.
pub const URL_POST_CONSUMPTION_XML: &str =
    r#"https://app.bchydro.com/evportlet/web/consumption-data.html"#;

// Interactive login page used by the browser driver.
pub const URL_LOGIN_PAGE: &str = r#"https://app.bchydro.com/BCHCustomerPortal/web/login.html"#;

// Time constants in seconds
pub const FIVE_MINUTES: u64 = 300;

pub fn get_timezone() -> Tz {
    let timezone = dotenv::var("CHRONO_TIMEZONE").unwrap_or("America/Vancouver".to_string());
    timezone.parse().unwrap()
}
