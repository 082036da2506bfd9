use async_trait::async_trait;

use crate::error::Error;
use crate::models::{Account, Granularity};

/// Transport behind [`crate::BchydroClient`].
///
/// The plain HTTP scraper ([`crate::HttpDriver`]) and the headless-browser
/// driver implement the same contract, so the public operations are
/// identical regardless of the mechanism.
#[async_trait]
pub trait UsageDriver {
    /// Log in to the portal and return a fresh account snapshot, replacing
    /// any prior session state wholesale.
    async fn authenticate(&mut self) -> Result<Account, Error>;

    /// Fetch the raw consumption XML for the account's current billing
    /// period. Returns [`Error::SessionExpired`] when the response suggests
    /// the session was dropped, asking the caller to re-authenticate and
    /// retry once.
    async fn fetch_consumption(
        &mut self,
        account: &Account,
        granularity: Granularity,
    ) -> Result<String, Error>;
}
