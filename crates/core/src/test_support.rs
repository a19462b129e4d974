//! Mock quote provider shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use leaderboard_market_data::{
    BarInterval, DailyClose, MarketDataError, PriceBar, QuoteProvider, QuoteSnapshot,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug)]
pub enum Failure {
    RateLimited,
    Unavailable,
}

impl Failure {
    fn to_error(self) -> MarketDataError {
        match self {
            Failure::RateLimited => MarketDataError::RateLimited {
                provider: "MOCK".to_string(),
            },
            Failure::Unavailable => MarketDataError::ProviderError {
                provider: "MOCK".to_string(),
                message: "service unavailable".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct MockState {
    quotes: HashMap<String, QuoteSnapshot>,
    batch_failure: Option<Failure>,
    quote_failures: HashMap<String, Failure>,
    closes: HashMap<String, Vec<DailyClose>>,
    close_failures: HashMap<String, Failure>,
    bars: HashMap<String, Vec<PriceBar>>,
    calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_quote(&self, symbol: &str, price: Decimal, previous_close: Option<Decimal>) {
        let mut snapshot = QuoteSnapshot::new(symbol, price, Utc::now()).with_source("MOCK");
        snapshot.previous_close = previous_close;
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(symbol.to_string(), snapshot);
    }

    pub fn add_close(&self, symbol: &str, date: NaiveDate, close: Decimal) {
        let mut state = self.state.lock().unwrap();
        let closes = state.closes.entry(symbol.to_string()).or_default();
        closes.push(DailyClose::new(date, close));
        closes.sort_by_key(|c| c.date);
    }

    pub fn add_bar(&self, symbol: &str, timestamp: DateTime<Utc>, open: Decimal, close: Decimal) {
        let mut state = self.state.lock().unwrap();
        state.bars.entry(symbol.to_string()).or_default().push(PriceBar {
            timestamp,
            open: Some(open),
            close,
        });
    }

    pub fn fail_batch(&self, failure: Option<Failure>) {
        self.state.lock().unwrap().batch_failure = failure;
    }

    pub fn fail_quote(&self, symbol: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .quote_failures
            .insert(symbol.to_string(), failure);
    }

    pub fn fail_closes(&self, symbol: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .close_failures
            .insert(symbol.to_string(), failure);
    }

    pub fn clear_close_failures(&self) {
        self.state.lock().unwrap().close_failures.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Symbols that had a daily-close request.
    pub fn close_symbols(&self) -> HashSet<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("closes:"))
            .filter_map(|rest| rest.split(':').next())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    async fn latest_quotes(
        &self,
        symbols: &[String],
    ) -> Result<Vec<QuoteSnapshot>, MarketDataError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("batch:{}", symbols.join(",")));
        if let Some(failure) = state.batch_failure {
            return Err(failure.to_error());
        }
        Ok(symbols
            .iter()
            .filter_map(|s| state.quotes.get(s).cloned())
            .collect())
    }

    async fn latest_quote(&self, symbol: &str) -> Result<QuoteSnapshot, MarketDataError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("quote:{}", symbol));
        if let Some(failure) = state.quote_failures.get(symbol) {
            return Err(failure.to_error());
        }
        state
            .quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))
    }

    async fn historical_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, MarketDataError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("closes:{}:{}:{}", symbol, start, end));
        if let Some(failure) = state.close_failures.get(symbol) {
            return Err(failure.to_error());
        }
        let closes: Vec<DailyClose> = state
            .closes
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|c| c.date >= start && c.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if closes.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }
        Ok(closes)
    }

    async fn intraday_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _interval: BarInterval,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("bars:{}", symbol));
        Ok(state
            .bars
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
