//! Freshness rules for cached dashboard data.
//!
//! While the market is open quotes move, so cached data is only trusted for
//! a short window. Once it closes nothing changes until the next session and
//! a day-old value is as good as a new one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a cached payload contains; selects its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataKind {
    LiveQuotes,
    Benchmarks,
    ChartSeries,
}

/// Max-age and TTL settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub open_max_age: Duration,
    pub closed_max_age: Duration,
    pub open_quotes_ttl: Duration,
    pub open_series_ttl: Duration,
    pub closed_ttl: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            open_max_age: Duration::minutes(15),
            closed_max_age: Duration::hours(24),
            open_quotes_ttl: Duration::minutes(15),
            open_series_ttl: Duration::minutes(30),
            closed_ttl: Duration::hours(24),
        }
    }
}

impl FreshnessPolicy {
    /// Whether a value written at `last_update` may be served at `now`.
    ///
    /// A missing timestamp is never fresh. A timestamp ahead of `now` counts
    /// as written just now.
    pub fn should_use_cache(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        market_open: bool,
    ) -> bool {
        let Some(last_update) = last_update else {
            return false;
        };

        let age = (now - last_update).max(Duration::zero());
        age < self.max_age(market_open)
    }

    pub fn max_age(&self, market_open: bool) -> Duration {
        if market_open {
            self.open_max_age
        } else {
            self.closed_max_age
        }
    }

    /// TTL to attach to a freshly computed value of `kind`.
    pub fn ttl_for(&self, kind: DataKind, market_open: bool) -> Duration {
        if !market_open {
            return self.closed_ttl;
        }
        match kind {
            DataKind::LiveQuotes | DataKind::Benchmarks => self.open_quotes_ttl,
            DataKind::ChartSeries => self.open_series_ttl,
        }
    }
}
