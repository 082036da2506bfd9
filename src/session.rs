use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use http::StatusCode;

use crate::driver::UsageDriver;
use crate::error::Error;
use crate::html;
use crate::models::{Account, Granularity};
use crate::{FIVE_MINUTES, URL_LOGIN_GOTO};

const PORTAL_BASE: &str = r#"https://app.bchydro.com"#;

const PATH_POST_LOGIN: &str = "/sso/UI/Login";
const PATH_GET_ACCOUNTS: &str = "/BCHCustomerPortal/web/getAccounts.html";
const PATH_ACCOUNTS_OVERVIEW: &str = "/BCHCustomerPortal/web/accountsOverview.html";
const PATH_GET_ACCOUNT_JSON: &str = "/evportlet/web/global-data.html";
const PATH_POST_CONSUMPTION_XML: &str = "/evportlet/web/consumption-data.html";

// Authentication quota: repeated logins can lock an account out upstream.
const AUTH_CALLS_PER_WINDOW: u32 = 5;

struct Endpoints {
    login: String,
    accounts: String,
    overview: String,
    account_json: String,
    consumption: String,
}

impl Endpoints {
    fn for_base(base: &str) -> Self {
        Endpoints {
            login: format!("{}{}", base, PATH_POST_LOGIN),
            accounts: format!("{}{}", base, PATH_GET_ACCOUNTS),
            overview: format!("{}{}", base, PATH_ACCOUNTS_OVERVIEW),
            account_json: format!("{}{}", base, PATH_GET_ACCOUNT_JSON),
            consumption: format!("{}{}", base, PATH_POST_CONSUMPTION_XML),
        }
    }
}

/// Session manager for the portal's cookie-based login flow.
///
/// Owns the credentials, the session cookie jar and the anti-forgery token
/// scraped from the account page. Written only during authentication and
/// read by the fetch path.
pub struct HttpDriver {
    username: String,
    password: String,
    client: reqwest::Client,
    endpoints: Endpoints,
    token: Option<String>,
    auth_limiter: DefaultDirectRateLimiter,
}

impl HttpDriver {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, Error> {
        Self::with_base_url(username, password, PORTAL_BASE)
    }

    /// Point the driver at a different portal origin, eg. a local server
    /// standing in for the portal in tests.
    pub fn with_base_url(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;

        let period = Duration::from_secs(FIVE_MINUTES / AUTH_CALLS_PER_WINDOW as u64);
        let quota = Quota::with_period(period)
            .unwrap()
            .allow_burst(NonZeroU32::new(AUTH_CALLS_PER_WINDOW).unwrap());

        Ok(HttpDriver {
            username: username.into(),
            password: password.into(),
            client,
            endpoints: Endpoints::for_base(base_url),
            token: None,
            auth_limiter: RateLimiter::direct(quota),
        })
    }

    /// The anti-forgery token scraped during the last authentication.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    async fn authenticate_session(&mut self) -> Result<Account, Error> {
        // Delays rather than fails when the quota is exhausted.
        self.auth_limiter.until_ready().await;

        debug!("authenticating with username: {}", self.username);

        let response = self
            .client
            .post(&self.endpoints.login)
            .form(&[
                ("realm", "bch-ps"),
                ("email", self.username.as_str()),
                ("password", self.password.as_str()),
                ("gotoUrl", URL_LOGIN_GOTO),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Auth(anyhow::anyhow!("login returned HTTP {}", status)));
        }

        let page_html = response.text().await?;
        let mut page = html::validate_page(&page_html)?;

        // If the user has multiple linked accounts (eg. after a move), pick
        // the first one and re-land on its overview page.
        if page.has_account_list {
            debug!("multiple linked accounts, selecting the first one");

            let accounts: serde_json::Value = self
                .client
                .post(&self.endpoints.accounts)
                .header("x-csrf-token", page.token.as_str())
                .send()
                .await?
                .json()
                .await?;

            let entry = &accounts["accounts"][0]["accountId"];
            let account_id = entry
                .as_str()
                .map(|id| id.to_string())
                .or_else(|| entry.as_u64().map(|id| id.to_string()))
                .ok_or_else(|| {
                    Error::Auth(anyhow::anyhow!("account list is missing accountId"))
                })?;

            let response = self
                .client
                .get(format!("{}?aid={}", self.endpoints.overview, account_id))
                .send()
                .await?;
            let page_html = response.text().await?;
            page = html::validate_page(&page_html)?;
        }

        self.token = Some(page.token);

        let body = self
            .client
            .get(&self.endpoints.account_json)
            .send()
            .await?
            .text()
            .await?;
        debug!("account JSON response: {}", body);

        let account: Account = serde_json::from_str(&body)
            .map_err(|err| Error::Auth(anyhow::anyhow!("unable to decode account JSON: {}", err)))?;

        Ok(account)
    }

    async fn fetch_consumption_xml(
        &self,
        account: &Account,
        granularity: Granularity,
    ) -> Result<String, Error> {
        let token = self.token.as_deref().ok_or(Error::Param)?;

        let response = self
            .client
            .post(&self.endpoints.consumption)
            .header("bchydroparam", token)
            .form(&[
                ("Slid", account.slid.as_str()),
                ("Account", account.account.as_str()),
                ("ChartType", "column"),
                ("Granularity", granularity.as_str()),
                ("Overlays", "none"),
                ("DateRange", "currentBill"),
                ("StartDateTime", account.billing_start.as_str()),
                ("EndDateTime", account.billing_end.as_str()),
                ("RateGroup", account.rate_group.as_str()),
            ])
            .send()
            .await?;

        // A redirect away from the endpoint means the session was dropped.
        if response.url().as_str() != self.endpoints.consumption {
            debug!("Unexpected XML URL {}, has session expired?", response.url());
            return Err(Error::SessionExpired("unexpected redirect URL"));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/xml") {
            debug!("Unexpected content-type {}, has session expired?", content_type);
            return Err(Error::SessionExpired("unexpected content type"));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl UsageDriver for HttpDriver {
    async fn authenticate(&mut self) -> Result<Account, Error> {
        self.authenticate_session().await
    }

    async fn fetch_consumption(
        &mut self,
        account: &Account,
        granularity: Granularity,
    ) -> Result<String, Error> {
        self.fetch_consumption_xml(account, granularity).await
    }
}
