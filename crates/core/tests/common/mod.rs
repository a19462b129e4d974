//! Shared fixtures for the core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use leaderboard_core::calendar::EXCHANGE_TZ;
use leaderboard_core::{ManualClock, MarketCalendar, TieredCache};
use leaderboard_market_data::{
    BarInterval, DailyClose, MarketDataError, PriceBar, QuoteProvider, QuoteSnapshot,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    EXCHANGE_TZ
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn in_memory_cache(now: DateTime<Utc>) -> (Arc<TieredCache>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let cache = Arc::new(TieredCache::in_memory(
        Arc::new(MarketCalendar::us_equities()),
        clock.clone(),
    ));
    (cache, clock)
}

#[derive(Default)]
struct ScriptState {
    quotes: HashMap<String, QuoteSnapshot>,
    batch_rate_limited: bool,
    batch_down: bool,
    closes: HashMap<String, Vec<DailyClose>>,
    closes_down: HashSet<String>,
    calls: Vec<String>,
}

/// Provider whose answers are set up front by the test.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    pub fn quote(&self, symbol: &str, price: Decimal, previous_close: Option<Decimal>) {
        let mut snapshot = QuoteSnapshot::new(symbol, price, Utc::now());
        snapshot.previous_close = previous_close;
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(symbol.to_string(), snapshot);
    }

    pub fn close(&self, symbol: &str, date: NaiveDate, close: Decimal) {
        let mut state = self.state.lock().unwrap();
        let closes = state.closes.entry(symbol.to_string()).or_default();
        closes.retain(|c| c.date != date);
        closes.push(DailyClose::new(date, close));
        closes.sort_by_key(|c| c.date);
    }

    pub fn rate_limit_batch(&self, on: bool) {
        self.state.lock().unwrap().batch_rate_limited = on;
    }

    pub fn batch_down(&self, on: bool) {
        self.state.lock().unwrap().batch_down = on;
    }

    pub fn closes_down(&self, symbol: &str, down: bool) {
        let mut state = self.state.lock().unwrap();
        if down {
            state.closes_down.insert(symbol.to_string());
        } else {
            state.closes_down.remove(symbol);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Symbols that had any daily-close request since the last clear.
    pub fn close_requests(&self) -> HashSet<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("closes:"))
            .filter_map(|rest| rest.split(':').next())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl QuoteProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    async fn latest_quotes(
        &self,
        symbols: &[String],
    ) -> Result<Vec<QuoteSnapshot>, MarketDataError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("batch:{}", symbols.join(",")));
        if state.batch_rate_limited {
            return Err(MarketDataError::RateLimited {
                provider: "SCRIPTED".to_string(),
            });
        }
        if state.batch_down {
            return Err(MarketDataError::ProviderError {
                provider: "SCRIPTED".to_string(),
                message: "503".to_string(),
            });
        }
        Ok(symbols
            .iter()
            .filter_map(|s| state.quotes.get(s).cloned())
            .collect())
    }

    async fn latest_quote(&self, symbol: &str) -> Result<QuoteSnapshot, MarketDataError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("quote:{}", symbol));
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
        if state.closes_down.contains(symbol) {
            return Err(MarketDataError::Timeout {
                provider: "SCRIPTED".to_string(),
            });
        }
        let found: Vec<DailyClose> = state
            .closes
            .get(symbol)
            .into_iter()
            .flatten()
            .filter(|c| c.date >= start && c.date <= end)
            .cloned()
            .collect();
        if found.is_empty() {
            Err(MarketDataError::NoDataForRange)
        } else {
            Ok(found)
        }
    }

    async fn intraday_bars(
        &self,
        symbol: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _interval: BarInterval,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("bars:{}", symbol));
        Ok(Vec::new())
    }
}
