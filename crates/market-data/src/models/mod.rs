//! Market data models
//!
//! - `quote` - Live quote snapshots, daily closes and intraday bars

mod quote;

pub use quote::{BarInterval, DailyClose, PriceBar, QuoteSnapshot};
