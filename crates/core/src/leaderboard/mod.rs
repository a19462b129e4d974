//! Leaderboard payloads built on the cache layer.
//!
//! Every read goes through the same path: serve the cached payload while the
//! freshness policy accepts it, otherwise recompute from upstream quotes and
//! baselines, and fall back to the last known payload when that fails.

pub mod compute;
mod model;
mod service;
mod service_tests;

pub use model::{
    BenchmarkRecord, ChartSeries, ManagerAnalysis, PerformanceRecord, RefreshSummary, SeriesLine,
};
pub use service::{LeaderboardService, LeaderboardServiceTrait};
