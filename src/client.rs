use chrono::Utc;

use crate::cache::UsageCache;
use crate::driver::UsageDriver;
use crate::error::Error;
use crate::models::{Account, DailyUsage, ElectricityPoint, Granularity, Interval};
use crate::session::HttpDriver;
use crate::settings::Settings;
use crate::xml;
use crate::FIVE_MINUTES;

// Each public accessor retries its whole refresh-then-read sequence this
// many times, so a session that expired between check and use self-heals.
const ACCESSOR_ATTEMPTS: u32 = 2;

/// Client for the portal's consumption data.
///
/// Wraps a [`UsageDriver`] with the TTL-bounded usage cache and the bounded
/// retry policy. One logical flow of control: a single authentication or
/// fetch executes at a time, and the account/usage pair is always replaced
/// together.
pub struct BchydroClient<D = HttpDriver> {
    driver: D,
    account: Option<Account>,
    cache: UsageCache,
    granularity: Granularity,
}

impl BchydroClient<HttpDriver> {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, Error> {
        Ok(Self::with_driver(
            HttpDriver::new(username, password)?,
            FIVE_MINUTES,
        ))
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        Ok(Self::with_driver(
            HttpDriver::new(settings.username.clone(), settings.password.clone())?,
            settings.cache_ttl,
        ))
    }
}

impl<D: UsageDriver> BchydroClient<D> {
    /// Build a client over any driver, eg. the browser driver.
    pub fn with_driver(driver: D, cache_ttl_seconds: u64) -> Self {
        BchydroClient {
            driver,
            account: None,
            cache: UsageCache::new(cache_ttl_seconds),
            granularity: Granularity::Daily,
        }
    }

    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.granularity = granularity;
    }

    /// The account snapshot from the last successful authentication.
    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Log in and replace the account snapshot wholesale.
    pub async fn authenticate(&mut self) -> Result<(), Error> {
        let account = self.driver.authenticate().await?;
        self.account = Some(account);
        Ok(())
    }

    /// The current usage for the billing period, fetched through the cache.
    pub async fn get_usage(&mut self) -> Result<DailyUsage, Error> {
        self.refresh_with_retry().await
    }

    /// The last ACTUAL-quality point, or `None` when no ACTUAL points exist.
    pub async fn get_latest_point(&mut self) -> Result<Option<ElectricityPoint>, Error> {
        let usage = self.refresh_with_retry().await?;
        Ok(usage.latest_point().cloned())
    }

    pub async fn get_latest_interval(&mut self) -> Result<Option<Interval>, Error> {
        let usage = self.refresh_with_retry().await?;
        Ok(usage.latest_point().map(|point| point.interval.clone()))
    }

    pub async fn get_latest_usage_value(&mut self) -> Result<Option<String>, Error> {
        let usage = self.refresh_with_retry().await?;
        Ok(usage.latest_point().map(|point| point.consumption.clone()))
    }

    pub async fn get_latest_cost(&mut self) -> Result<Option<String>, Error> {
        let usage = self.refresh_with_retry().await?;
        Ok(usage.latest_point().map(|point| point.cost.clone()))
    }

    async fn refresh_with_retry(&mut self) -> Result<DailyUsage, Error> {
        let mut attempt = 1;
        loop {
            match self.refresh().await {
                Ok(usage) => return Ok(usage),
                Err(err) if attempt < ACCESSOR_ATTEMPTS => {
                    warn!("usage refresh failed ({}), retrying", err);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One refresh cycle: return the cached value if fresh, otherwise
    /// ensure authentication, fetch, parse and replace the cached
    /// account/usage pair together.
    async fn refresh(&mut self) -> Result<DailyUsage, Error> {
        if let Some(usage) = self.cache.fresh(Utc::now()) {
            debug!("Returning cached usage");
            return Ok(usage.clone());
        }

        let (raw, account) = self.fetch_raw().await?;
        let (electricity, rates) = xml::parse_consumption_xml(&raw)?;

        let usage = DailyUsage {
            electricity,
            rates,
            account,
        };
        self.cache.store(usage.clone(), Utc::now());
        Ok(usage)
    }

    // A fetch may not be attempted without an account; an expired session
    // is recovered by exactly one re-authenticate-and-retry cycle.
    async fn fetch_raw(&mut self) -> Result<(String, Account), Error> {
        if self.account.is_none() {
            self.authenticate().await?;
        }
        let account = self.current_account()?;

        match self.driver.fetch_consumption(&account, self.granularity).await {
            Ok(raw) => Ok((raw, account)),
            Err(Error::SessionExpired(reason)) => {
                debug!("{}; re-authenticating and retrying once", reason);
                self.authenticate().await?;
                let account = self.current_account()?;
                let raw = self.driver.fetch_consumption(&account, self.granularity).await?;
                Ok((raw, account))
            }
            Err(err) => Err(err),
        }
    }

    fn current_account(&self) -> Result<Account, Error> {
        self.account
            .clone()
            .ok_or_else(|| Error::Auth(anyhow::anyhow!("no account available after login")))
    }
}
