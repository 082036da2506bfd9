use chrono::{DateTime, Duration, Utc};

use crate::models::DailyUsage;

/// Cache state for the single outstanding usage value.
///
/// Tagged explicitly so readers cannot trust a value without going through
/// the expiry check: `Empty -> Fresh -> Stale -> Empty|Fresh`.
#[derive(Debug, Clone)]
pub enum CacheState {
    Empty,
    Fresh {
        usage: DailyUsage,
        expires_at: DateTime<Utc>,
    },
    Stale {
        usage: DailyUsage,
    },
}

#[derive(Debug)]
pub struct UsageCache {
    ttl: Duration,
    state: CacheState,
}

impl UsageCache {
    pub fn new(ttl_seconds: u64) -> Self {
        UsageCache {
            ttl: Duration::seconds(ttl_seconds as i64),
            state: CacheState::Empty,
        }
    }

    /// The cached usage if it is still fresh at `now`. An entry whose TTL
    /// has elapsed is demoted to `Stale` and no longer returned.
    pub fn fresh(&mut self, now: DateTime<Utc>) -> Option<&DailyUsage> {
        let expired = match &self.state {
            CacheState::Fresh { expires_at, .. } => now >= *expires_at,
            _ => false,
        };

        if expired {
            if let CacheState::Fresh { usage, .. } =
                std::mem::replace(&mut self.state, CacheState::Empty)
            {
                self.state = CacheState::Stale { usage };
            }
        }

        match &self.state {
            CacheState::Fresh { usage, .. } => Some(usage),
            _ => None,
        }
    }

    /// Replace the cached value wholesale after a successful refresh.
    pub fn store(&mut self, usage: DailyUsage, now: DateTime<Utc>) {
        self.state = CacheState::Fresh {
            usage,
            expires_at: now + self.ttl,
        };
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }
}
