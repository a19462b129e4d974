//! Quote provider trait definitions.
//!
//! This module defines the `QuoteProvider` trait that every upstream
//! market data source implements.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{BarInterval, DailyClose, PriceBar, QuoteSnapshot};

/// Trait for upstream quote providers.
///
/// Implementations translate transport and API failures into
/// [`MarketDataError`]. In particular they must return
/// [`MarketDataError::RateLimited`] when the upstream throttles, because the
/// refresh orchestrator keys its "stop and serve cache" behaviour off that
/// variant.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use leaderboard_market_data::QuoteProvider;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     // ... implement quote methods
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider, used in logs and errors.
    fn id(&self) -> &'static str;

    /// Fetch live quotes for several symbols in a single upstream call.
    ///
    /// Symbols the provider does not know are simply absent from the
    /// returned list; that is not an error.
    async fn latest_quotes(&self, symbols: &[String])
        -> Result<Vec<QuoteSnapshot>, MarketDataError>;

    /// Fetch the live quote for one symbol.
    async fn latest_quote(&self, symbol: &str) -> Result<QuoteSnapshot, MarketDataError>;

    /// Fetch daily closes between `start` and `end` (both inclusive),
    /// ordered by date ascending.
    async fn historical_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, MarketDataError>;

    /// Fetch the close for exactly `date`.
    ///
    /// Returns `Ok(None)` when the provider has no bar for that day (market
    /// holiday, weekend, not yet listed).
    async fn historical_close(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, MarketDataError> {
        match self.historical_closes(symbol, date, date).await {
            Ok(closes) => Ok(closes
                .into_iter()
                .find(|c| c.date == date)
                .map(|c| c.close)),
            Err(MarketDataError::NoDataForRange) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch intraday bars between `start` and `end`, ordered by timestamp.
    async fn intraday_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: BarInterval,
    ) -> Result<Vec<PriceBar>, MarketDataError>;
}
