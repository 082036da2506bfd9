//! Headless-browser implementation of the driver contract.
//!
//! Drives the portal's real login form, then reuses the page's own session
//! and token context by executing `fetch()` calls inside the page. Useful
//! when the plain HTTP login flow is broken by upstream changes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::driver::UsageDriver;
use crate::error::Error;
use crate::models::{Account, Granularity};
use crate::table::{self, TableRow};
use crate::{URL_GET_ACCOUNT_JSON, URL_LOGIN_PAGE, URL_POST_CONSUMPTION_XML};

pub struct BrowserDriver {
    username: String,
    password: String,
    exec_path: Option<PathBuf>,
    session: Option<BrowserSession>,
}

struct BrowserSession {
    // The browser must outlive the tab for the tab to stay usable.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserDriver {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        exec_path: Option<PathBuf>,
    ) -> Self {
        BrowserDriver {
            username: username.into(),
            password: password.into(),
            exec_path,
            session: None,
        }
    }

    /// Scrape the rendered consumption table instead of requesting XML.
    pub async fn fetch_consumption_table(&mut self) -> Result<BTreeMap<String, TableRow>, Error> {
        tokio::task::block_in_place(|| {
            if self.session.is_none() {
                self.sign_in()?;
            }
            self.open_detailed_consumption()?;

            debug!("Clicking Table button...");
            let tab = self.tab()?;
            tab.wait_for_element("#tableBtnLabel")
                .map_err(browser_err)?
                .click()
                .map_err(browser_err)?;
            tab.wait_for_element("table#consumptionTable")
                .map_err(browser_err)?;

            let html_table = self.evaluate_string(
                "document.querySelector('table#consumptionTable').outerHTML",
                false,
            )?;
            table::parse_consumption_table(&html_table)
        })
    }

    fn sign_in(&mut self) -> Result<(), Error> {
        let mut builder = LaunchOptions::default_builder();
        builder.path(self.exec_path.clone());
        let options = builder.build().map_err(browser_err)?;

        let browser = Browser::new(options).map_err(browser_err)?;
        let tab = browser.new_tab().map_err(browser_err)?;

        debug!("Populating login form...");
        tab.navigate_to(URL_LOGIN_PAGE).map_err(browser_err)?;
        tab.wait_for_element("#email")
            .map_err(browser_err)?
            .click()
            .map_err(browser_err)?;
        tab.type_str(&self.username).map_err(browser_err)?;
        tab.wait_for_element("#password")
            .map_err(browser_err)?
            .click()
            .map_err(browser_err)?;
        tab.type_str(&self.password).map_err(browser_err)?;

        debug!("Clicking login button...");
        tab.wait_for_element("#submit-button")
            .map_err(browser_err)?
            .click()
            .map_err(browser_err)?;
        tab.wait_until_navigated().map_err(browser_err)?;

        self.session = Some(BrowserSession {
            _browser: browser,
            tab,
        });
        Ok(())
    }

    fn tab(&self) -> Result<&Arc<Tab>, Error> {
        self.session
            .as_ref()
            .map(|session| &session.tab)
            .ok_or_else(|| Error::Browser("not signed in".to_string()))
    }

    fn evaluate_string(&self, expression: &str, await_promise: bool) -> Result<String, Error> {
        let result = self
            .tab()?
            .evaluate(expression, await_promise)
            .map_err(browser_err)?;

        match result.value {
            Some(serde_json::Value::String(text)) => Ok(text),
            other => Err(Error::Browser(format!(
                "unexpected evaluation result: {:?}",
                other
            ))),
        }
    }

    fn fetch_account(&self) -> Result<Account, Error> {
        debug!("Fetching account JSON in page context...");
        let body = self.evaluate_string(
            &format!(
                r#"(async () => {{
                    const res = await fetch("{}");
                    return await res.text();
                }})()"#,
                URL_GET_ACCOUNT_JSON
            ),
            true,
        )?;

        serde_json::from_str(&body)
            .map_err(|err| Error::Auth(anyhow::anyhow!("unable to decode account JSON: {}", err)))
    }

    fn open_detailed_consumption(&self) -> Result<(), Error> {
        debug!("Clicking Detailed Consumption button...");
        let tab = self.tab()?;
        tab.wait_for_element("#detailCon:not([disabled])")
            .map_err(browser_err)?
            .click()
            .map_err(browser_err)?;
        tab.wait_until_navigated().map_err(browser_err)?;
        Ok(())
    }

    fn fetch_consumption_sync(
        &self,
        account: &Account,
        granularity: Granularity,
    ) -> Result<String, Error> {
        self.open_detailed_consumption()?;

        debug!("Extracting bchydroparam...");
        let token =
            self.evaluate_string("document.querySelector('span#bchydroparam').innerText", false)?;

        let postdata = format!(
            "Slid={}&Account={}&ChartType=column&Granularity={}&Overlays=none&DateRange=currentBill&StartDateTime={}&EndDateTime={}&RateGroup={}",
            urlencoding::encode(&account.slid),
            urlencoding::encode(&account.account),
            granularity.as_str(),
            urlencoding::encode(&account.billing_start),
            urlencoding::encode(&account.billing_end),
            urlencoding::encode(&account.rate_group),
        );

        debug!("Making fetch() request...");
        let expression = format!(
            r#"(async () => {{
                const res = await fetch("{url}", {{
                    method: "POST",
                    headers: {{
                        "Content-Type": "application/x-www-form-urlencoded",
                        "bchydroparam": "{token}",
                        "x-csrf-token": "{token}"
                    }},
                    body: "{body}"
                }});
                return await res.text();
            }})()"#,
            url = URL_POST_CONSUMPTION_XML,
            token = token,
            body = postdata,
        );

        self.evaluate_string(&expression, true)
    }
}

#[async_trait]
impl UsageDriver for BrowserDriver {
    async fn authenticate(&mut self) -> Result<Account, Error> {
        tokio::task::block_in_place(|| {
            self.sign_in()?;
            self.fetch_account()
        })
    }

    async fn fetch_consumption(
        &mut self,
        account: &Account,
        granularity: Granularity,
    ) -> Result<String, Error> {
        tokio::task::block_in_place(|| self.fetch_consumption_sync(account, granularity))
    }
}

fn browser_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Browser(err.to_string())
}
