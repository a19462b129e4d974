//! Leaderboard Market Data Crate
//!
//! This crate wraps the upstream quote source used by the leaderboard.
//!
//! # Overview
//!
//! - [`QuoteProvider`] - provider-agnostic trait for live quotes, daily
//!   closes and intraday bars
//! - [`YahooProvider`] - Yahoo Finance implementation
//! - [`MarketDataError`] - error type with a dedicated rate-limit variant
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |  Refresh/Baseline| --> |  QuoteProvider   |  (trait object)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  YahooProvider   |  (v7 quote + chart API)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  QuoteSnapshot   |  (market data)
//!                          +------------------+
//! ```

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{MarketDataError, RetryClass};
pub use models::{BarInterval, DailyClose, PriceBar, QuoteSnapshot};
pub use provider::yahoo::YahooProvider;
pub use provider::QuoteProvider;
