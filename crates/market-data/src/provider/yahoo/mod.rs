//! Yahoo Finance quote provider.
//!
//! Live quotes for a whole roster come from the v7 `finance/quote` endpoint
//! in a single call (cookie + crumb authenticated). Single-symbol quotes,
//! daily history and intraday bars go through the `yahoo_finance_api`
//! connector.

mod models;

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{BarInterval, DailyClose, PriceBar, QuoteSnapshot};
use crate::provider::QuoteProvider;

use models::{YahooQuoteItem, YahooQuoteResponse};

const PROVIDER_ID: &str = "YAHOO";
const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance quote provider.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    client: Client,
    crumb: RwLock<Option<CrumbData>>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider whose HTTP calls give up after
    /// `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to initialize Yahoo connector: {}", e),
            })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            connector,
            client,
            crumb: RwLock::new(None),
        })
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    /// Ensure we have a valid Yahoo authentication crumb.
    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        let cached = self.crumb.read().ok().and_then(|guard| guard.clone());
        if let Some(crumb) = cached {
            return Ok(crumb);
        }

        self.fetch_crumb().await
    }

    /// Fetch a new Yahoo authentication crumb.
    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get(COOKIE_URL)
            .send()
            .await
            .map_err(transport_error)?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "Failed to parse Yahoo cookie".to_string(),
            })?;

        // Step 2: Get crumb using cookie
        let response = self
            .client
            .get(CRUMB_URL)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let crumb = response.text().await.map_err(transport_error)?;

        if status == StatusCode::TOO_MANY_REQUESTS || is_throttling_message(&crumb) {
            return Err(rate_limited());
        }
        if !status.is_success() || crumb.trim().is_empty() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to get crumb: HTTP {}", status),
            });
        }

        let crumb_data = CrumbData { cookie, crumb };

        if let Ok(mut guard) = self.crumb.write() {
            *guard = Some(crumb_data.clone());
        }

        Ok(crumb_data)
    }

    /// Clear the cached crumb (used when authentication fails)
    fn clear_crumb(&self) {
        if let Ok(mut guard) = self.crumb.write() {
            *guard = None;
        }
    }

    // ========================================================================
    // Quote Fetching
    // ========================================================================

    /// Fetch live quotes for many symbols through the v7 quote endpoint.
    async fn fetch_quote_batch(
        &self,
        symbols: &[String],
    ) -> Result<Vec<QuoteSnapshot>, MarketDataError> {
        let crumb = self.ensure_crumb().await?;

        let url = format!(
            "{}?symbols={}&crumb={}",
            QUOTE_URL,
            encode(&symbols.join(",")),
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited());
        }

        if status == StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "Yahoo authentication expired".to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_throttling_message(&body) {
                return Err(rate_limited());
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        let data: YahooQuoteResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Failed to parse quote response: {}", e),
                })?;

        if let Some(error) = data.quote_response.error {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: error
                    .description
                    .or(error.code)
                    .unwrap_or_else(|| "Unknown quote error".to_string()),
            });
        }

        Ok(data
            .quote_response
            .result
            .into_iter()
            .map(item_to_snapshot)
            .collect())
    }

    /// Convert a connector bar to a daily close.
    fn bar_to_daily_close(yahoo_quote: &yahoo::Quote) -> Option<DailyClose> {
        let timestamp = Utc
            .timestamp_opt(yahoo_quote.timestamp as i64, 0)
            .single()?;
        let close = to_decimal(yahoo_quote.close)?;
        Some(DailyClose::new(timestamp.date_naive(), close))
    }

    /// Convert a connector bar to an intraday price bar.
    fn bar_to_price_bar(yahoo_quote: &yahoo::Quote) -> Option<PriceBar> {
        let timestamp = Utc
            .timestamp_opt(yahoo_quote.timestamp as i64, 0)
            .single()?;
        Some(PriceBar {
            timestamp,
            open: to_decimal(yahoo_quote.open),
            close: to_decimal(yahoo_quote.close)?,
        })
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn latest_quotes(
        &self,
        symbols: &[String],
    ) -> Result<Vec<QuoteSnapshot>, MarketDataError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Fetching batch quote for {} symbols from Yahoo", symbols.len());
        self.fetch_quote_batch(symbols).await
    }

    async fn latest_quote(&self, symbol: &str) -> Result<QuoteSnapshot, MarketDataError> {
        debug!("Fetching latest quote for {} from Yahoo", symbol);

        let response = self
            .connector
            .get_latest_quotes(symbol, BarInterval::OneDay.as_code())
            .await
            .map_err(|e| map_connector_error(symbol, e))?;

        let bars = response
            .quotes()
            .map_err(|e| map_connector_error(symbol, e))?;

        let mut closes = bars.iter().filter_map(Self::bar_to_daily_close).rev();
        let last = closes
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
        let previous = closes.next();

        let timestamp = bars
            .last()
            .and_then(|q| Utc.timestamp_opt(q.timestamp as i64, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(QuoteSnapshot {
            symbol: symbol.to_string(),
            price: Some(last.close),
            previous_close: previous.map(|c| c.close),
            timestamp,
            currency: "USD".to_string(),
            source: PROVIDER_ID.to_string(),
        })
    }

    async fn historical_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, MarketDataError> {
        debug!(
            "Fetching daily closes for {} from {} to {} from Yahoo",
            symbol, start, end
        );

        let start_time = date_to_offset_datetime(start);
        let end_time = date_to_offset_datetime(end.succ_opt().unwrap_or(end));

        let response = self
            .connector
            .get_quote_history(symbol, start_time, end_time)
            .await
            .map_err(|e| match e {
                yahoo::YahooError::NoQuotes => MarketDataError::NoDataForRange,
                other => map_connector_error(symbol, other),
            })?;

        match response.quotes() {
            Ok(bars) => {
                let closes: Vec<DailyClose> = bars
                    .iter()
                    .filter_map(Self::bar_to_daily_close)
                    .filter(|c| c.date >= start && c.date <= end)
                    .collect();

                if closes.is_empty() {
                    return Err(MarketDataError::NoDataForRange);
                }
                Ok(closes)
            }
            Err(yahoo::YahooError::NoQuotes) => {
                warn!(
                    "No daily closes returned for '{}' between {} and {}",
                    symbol, start, end
                );
                Err(MarketDataError::NoDataForRange)
            }
            Err(e) => Err(map_connector_error(symbol, e)),
        }
    }

    async fn intraday_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: BarInterval,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        debug!(
            "Fetching {} bars for {} from {} to {} from Yahoo",
            interval.as_code(),
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let response = self
            .connector
            .get_quote_history_interval(
                symbol,
                datetime_to_offset_datetime(start),
                datetime_to_offset_datetime(end),
                interval.as_code(),
            )
            .await
            .map_err(|e| map_connector_error(symbol, e))?;

        let mut bars: Vec<PriceBar> = response
            .quotes()
            .map_err(|e| map_connector_error(symbol, e))?
            .iter()
            .filter_map(Self::bar_to_price_bar)
            .collect();
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Status prefixes that precede a numeric HTTP code in connector errors.
const STATUS_PREFIXES: [&str; 5] = ["http ", "http error: ", "status code ", "status: ", "status "];

/// Upstream wording Yahoo uses when it throttles.
///
/// A bare `429` is not enough: symbols and prices in error text can contain
/// those digits, so the code must follow a status prefix.
fn is_throttling_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    if lower.contains("too many requests") {
        return true;
    }
    STATUS_PREFIXES.iter().any(|prefix| {
        let pattern = format!("{}429", prefix);
        lower.match_indices(&pattern).any(|(at, _)| {
            !lower[at + pattern.len()..].starts_with(|c: char| c.is_ascii_digit())
        })
    })
}

fn rate_limited() -> MarketDataError {
    MarketDataError::RateLimited {
        provider: PROVIDER_ID.to_string(),
    }
}

/// Map a reqwest failure, keeping timeouts distinguishable.
fn transport_error(e: reqwest::Error) -> MarketDataError {
    if e.is_timeout() {
        MarketDataError::Timeout {
            provider: PROVIDER_ID.to_string(),
        }
    } else if e.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        rate_limited()
    } else {
        MarketDataError::Network(e)
    }
}

/// Map a connector failure into the crate error, detecting throttling.
fn map_connector_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
    if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
        return MarketDataError::SymbolNotFound(symbol.to_string());
    }

    let message = e.to_string();
    if is_throttling_message(&message) {
        return rate_limited();
    }

    MarketDataError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        message,
    }
}

fn item_to_snapshot(item: YahooQuoteItem) -> QuoteSnapshot {
    let timestamp = item
        .regular_market_time
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    QuoteSnapshot {
        symbol: item.symbol,
        price: item.regular_market_price.and_then(to_decimal),
        previous_close: item.regular_market_previous_close.and_then(to_decimal),
        timestamp,
        currency: item.currency.unwrap_or_else(|| "USD".to_string()),
        source: PROVIDER_ID.to_string(),
    }
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::try_from(value).ok()
}

/// Convert chrono DateTime<Utc> to time::OffsetDateTime for the connector.
fn datetime_to_offset_datetime(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn date_to_offset_datetime(date: NaiveDate) -> OffsetDateTime {
    datetime_to_offset_datetime(date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_throttling_message_detection() {
        assert!(is_throttling_message("Too Many Requests"));
        assert!(is_throttling_message("fetching the data from yahoo! finance failed: HTTP 429"));
        assert!(!is_throttling_message("Not Found"));
    }

    #[test]
    fn test_throttling_needs_a_status_code_not_just_digits() {
        assert!(is_throttling_message("request failed with status code 429"));
        assert!(is_throttling_message("Status: 429"));
        assert!(is_throttling_message("HTTP error: 429"));
        assert!(!is_throttling_message("No data found for symbol 4290.T"));
        assert!(!is_throttling_message("price 1429.5 outside range"));
        assert!(!is_throttling_message("HTTP 4290"));

        let error = map_connector_error(
            "4290.T",
            yahoo::YahooError::FetchFailed("HTTP 404 for 4290.T".to_string()),
        );
        assert!(!matches!(error, MarketDataError::RateLimited { .. }));
    }

    #[test]
    fn test_connector_no_quotes_is_symbol_not_found() {
        let error = map_connector_error("ZZZZ", yahoo::YahooError::NoQuotes);
        assert!(matches!(error, MarketDataError::SymbolNotFound(s) if s == "ZZZZ"));
    }

    #[test]
    fn test_item_to_snapshot_keeps_missing_prices_as_none() {
        let item = YahooQuoteItem {
            symbol: "CRCL".to_string(),
            currency: None,
            regular_market_price: None,
            regular_market_previous_close: Some(80.5),
            regular_market_time: Some(1_767_204_000),
        };

        let snapshot = item_to_snapshot(item);
        assert_eq!(snapshot.symbol, "CRCL");
        assert_eq!(snapshot.price, None);
        assert_eq!(snapshot.previous_close, Some(dec!(80.5)));
        assert_eq!(snapshot.currency, "USD");
        assert_eq!(snapshot.source, "YAHOO");
    }

    #[test]
    fn test_to_decimal_rejects_non_finite() {
        assert_eq!(to_decimal(f64::NAN), None);
        assert_eq!(to_decimal(f64::INFINITY), None);
        assert_eq!(to_decimal(12.5), Some(dec!(12.5)));
    }

    #[test]
    fn test_date_to_offset_datetime_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let odt = date_to_offset_datetime(date);
        assert_eq!(odt.unix_timestamp(), 1_767_139_200);
    }
}
