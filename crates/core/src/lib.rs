//! Leaderboard Core - cache-and-freshness layer for the stock leaderboard.
//!
//! This crate decides when to call the upstream quote provider and when to
//! serve stored data. It is transport-agnostic: the HTTP server and the
//! scheduler in `apps/server` are thin callers of [`LeaderboardService`].

pub mod baseline;
pub mod cache;
pub mod calendar;
pub mod clock;
pub mod constants;
pub mod errors;
pub mod freshness;
pub mod leaderboard;
pub mod managers;
pub mod refresh;

#[cfg(test)]
pub(crate) mod test_support;

pub use baseline::{BaselinePrices, BaselineResolver};
pub use cache::{TieredCache, TieredCacheConfig, TtlHint};
pub use calendar::{HolidayTable, MarketCalendar};
pub use clock::{Clock, ManualClock, SystemClock};
pub use freshness::{DataKind, FreshnessPolicy};
pub use leaderboard::{LeaderboardService, LeaderboardServiceTrait};
pub use managers::{JsonFileManagers, Manager, ManagerSource, StaticManagers};
pub use refresh::{QuoteRefresher, RefreshOutcome, RefreshState, UpstreamGate};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
