//! Yahoo Finance API response models.
//!
//! These models parse the v7 `finance/quote` endpoint, which returns live
//! quotes for many symbols in one call.

use serde::Deserialize;

/// Main response wrapper for the quote API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteResponse {
    pub quote_response: YahooQuoteResult,
}

/// Quote result container
#[derive(Debug, Deserialize)]
pub struct YahooQuoteResult {
    #[serde(default)]
    pub result: Vec<YahooQuoteItem>,
    pub error: Option<YahooApiError>,
}

/// Error object embedded in a 200 response
#[derive(Debug, Deserialize)]
pub struct YahooApiError {
    pub code: Option<String>,
    pub description: Option<String>,
}

/// One symbol's live quote
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteItem {
    pub symbol: String,
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_previous_close: Option<f64>,
    pub regular_market_time: Option<i64>,
}
