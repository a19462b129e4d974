use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Live quote for one symbol as returned by a provider.
///
/// Prices are optional: providers routinely return a symbol with no
/// regular-market price (halted, pre-listing, partial payload). Callers treat
/// a snapshot without a price as "no data" for that symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshot {
    /// Provider symbol the snapshot belongs to
    pub symbol: String,

    /// Current (or last) regular-market price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Previous session close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    /// Timestamp of the price
    pub timestamp: DateTime<Utc>,

    /// Quote currency
    pub currency: String,

    /// Source of the quote (YAHOO, ...)
    pub source: String,
}

impl QuoteSnapshot {
    /// Create a snapshot with a price and no previous close.
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price: Some(price),
            previous_close: None,
            timestamp,
            currency: "USD".to_string(),
            source: String::new(),
        }
    }

    /// Builder-style setter for the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// True when the snapshot carries a positive price.
    pub fn is_usable(&self) -> bool {
        self.price.is_some_and(|p| p > Decimal::ZERO)
    }
}

/// End-of-day close for one trading date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: Decimal,
}

impl DailyClose {
    pub fn new(date: NaiveDate, close: Decimal) -> Self {
        Self { date, close }
    }
}

/// Intraday OHLC bar (only open and close are kept).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// End-of-bar timestamp as reported by the provider
    pub timestamp: DateTime<Utc>,

    /// Opening price of the bar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    /// Closing price of the bar
    pub close: Decimal,
}

/// Bar width for intraday history requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarInterval {
    OneHour,
    OneDay,
}

impl BarInterval {
    /// Interval code understood by chart-style APIs.
    pub fn as_code(&self) -> &'static str {
        match self {
            BarInterval::OneHour => "1h",
            BarInterval::OneDay => "1d",
        }
    }
}
