//! Baseline (anchor-date) closing prices.
//!
//! The anchor defaults to the last calendar day of the previous year. Its
//! close is fetched once per symbol and kept in the permanent cache tier
//! under a key derived from the anchor date.

use chrono::{Datelike, NaiveDate};
use futures::future::join_all;
use leaderboard_market_data::{MarketDataError, QuoteProvider};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{TieredCache, TtlHint};
use crate::constants::{BASELINE_KEY_PREFIX, DEFAULT_UPSTREAM_TIMEOUT_SECS};
use crate::refresh::{bounded, UpstreamGate};

/// Baseline close per symbol; `None` when it could not be resolved.
pub type BaselinePrices = HashMap<String, Option<Decimal>>;

/// December 31 of the year before `today`.
pub fn default_anchor(today: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year() - 1, 12, 31).unwrap_or(today)
}

pub fn baseline_key(anchor: NaiveDate) -> String {
    format!("{}{}", BASELINE_KEY_PREFIX, anchor.format("%Y-%m-%d"))
}

pub struct BaselineResolver {
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<TieredCache>,
    anchor: Option<NaiveDate>,
    timeout: Duration,
}

impl BaselineResolver {
    pub fn new(provider: Arc<dyn QuoteProvider>, cache: Arc<TieredCache>) -> Self {
        Self {
            provider,
            cache,
            anchor: None,
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }

    /// Pin the anchor date instead of deriving it from the clock.
    pub fn with_anchor(mut self, anchor: Option<NaiveDate>) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor.unwrap_or_else(|| {
            let today = self.cache.calendar().local_date(self.cache.now());
            default_anchor(today)
        })
    }

    /// Day whose close is used: the anchor, or the last trading day before
    /// it in the same month.
    pub fn effective_date(&self, anchor: NaiveDate) -> NaiveDate {
        self.cache
            .calendar()
            .last_trading_day_in_month(anchor)
            .unwrap_or(anchor)
    }

    pub async fn resolve_baselines(&self, symbols: &[String]) -> BaselinePrices {
        self.resolve_baselines_with_gate(symbols, &UpstreamGate::new())
            .await
    }

    /// Resolve baselines for `symbols`.
    ///
    /// Served from cache only when every symbol already has a price;
    /// otherwise all of them are fetched again. A failed fetch keeps the
    /// previously cached price for that symbol.
    pub async fn resolve_baselines_with_gate(
        &self,
        symbols: &[String],
        gate: &UpstreamGate,
    ) -> BaselinePrices {
        let anchor = self.anchor();
        let key = baseline_key(anchor);
        let cached: BaselinePrices = self.cache.get_as(&key).await.unwrap_or_default();

        let covered = symbols
            .iter()
            .all(|s| cached.get(s).is_some_and(Option::is_some));
        if covered {
            debug!("Baseline cache hit for {} symbols at {}", symbols.len(), anchor);
            return symbols
                .iter()
                .map(|s| (s.clone(), cached.get(s).copied().flatten()))
                .collect();
        }

        if !cached.is_empty() {
            let missing = symbols
                .iter()
                .filter(|s| !cached.get(*s).is_some_and(Option::is_some))
                .count();
            info!(
                "Baseline cache for {} lacks {} of {} symbols; re-resolving all",
                anchor,
                missing,
                symbols.len()
            );
        }

        let effective = self.effective_date(anchor);
        if effective != anchor {
            debug!("Anchor {} is not a trading day; using {}", anchor, effective);
        }

        let fetches = symbols.iter().map(|symbol| async move {
            let price = self.fetch_close(symbol, effective, gate).await;
            (symbol.clone(), price)
        });

        let mut resolved = BaselinePrices::new();
        for (symbol, price) in join_all(fetches).await {
            let price = price.or_else(|| cached.get(&symbol).copied().flatten());
            resolved.insert(symbol, price);
        }

        let known: HashMap<&String, Decimal> = resolved
            .iter()
            .filter_map(|(symbol, price)| price.map(|p| (symbol, p)))
            .collect();
        if !known.is_empty() {
            if let Err(e) = self.cache.set_as(&key, &known, TtlHint::Permanent).await {
                warn!("Failed to store baselines for {}: {}", anchor, e);
            }
        }

        info!(
            "Resolved {}/{} baselines for {}",
            known.len(),
            symbols.len(),
            anchor
        );
        resolved
    }

    /// Close on `date`, or the latest close earlier in the same month.
    async fn fetch_close(
        &self,
        symbol: &str,
        date: NaiveDate,
        gate: &UpstreamGate,
    ) -> Option<Decimal> {
        if gate.is_tripped() {
            return None;
        }

        let exact = bounded(
            self.provider.id(),
            self.timeout,
            self.provider.historical_close(symbol, date),
        )
        .await;

        match exact {
            Ok(Some(close)) if close > Decimal::ZERO => return Some(close),
            Ok(_) => debug!("No close for {} on {}; widening to month", symbol, date),
            Err(e) => {
                self.note_failure(symbol, &e, gate);
                return None;
            }
        }

        let month_start = date.with_day(1)?;
        let range = bounded(
            self.provider.id(),
            self.timeout,
            self.provider.historical_closes(symbol, month_start, date),
        )
        .await;

        match range {
            Ok(closes) => closes
                .into_iter()
                .filter(|c| c.date <= date && c.close > Decimal::ZERO)
                .max_by_key(|c| c.date)
                .map(|c| c.close),
            Err(e) => {
                self.note_failure(symbol, &e, gate);
                None
            }
        }
    }

    fn note_failure(&self, symbol: &str, error: &MarketDataError, gate: &UpstreamGate) {
        if error.is_rate_limited() {
            gate.trip();
        }
        warn!("Baseline fetch failed for {}: {}", symbol, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{MarketCalendar, EXCHANGE_TZ};
    use crate::clock::ManualClock;
    use crate::test_support::{Failure, MockProvider};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (BaselineResolver, MockProvider, Arc<TieredCache>) {
        let now = EXCHANGE_TZ
            .with_ymd_and_hms(2026, 3, 3, 11, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let cache = Arc::new(TieredCache::in_memory(
            Arc::new(MarketCalendar::us_equities()),
            Arc::new(ManualClock::new(now)),
        ));
        let provider = MockProvider::new();
        let resolver = BaselineResolver::new(Arc::new(provider.clone()), cache.clone());
        (resolver, provider, cache)
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_anchor_is_prior_year_end() {
        assert_eq!(default_anchor(date(2026, 3, 3)), date(2025, 12, 31));
        assert_eq!(baseline_key(date(2025, 12, 31)), "stock:baselinePrices:2025-12-31");
    }

    #[tokio::test]
    async fn test_anchor_follows_clock() {
        let (resolver, _, _) = setup();
        assert_eq!(resolver.anchor(), date(2025, 12, 31));
        let pinned = resolver.with_anchor(Some(date(2024, 6, 30)));
        assert_eq!(pinned.anchor(), date(2024, 6, 30));
    }

    #[tokio::test]
    async fn test_resolves_and_caches_permanently() {
        let (resolver, provider, cache) = setup();
        provider.add_close("NVDA", date(2025, 12, 31), dec!(186.50));

        let prices = resolver.resolve_baselines(&symbols(&["NVDA"])).await;
        assert_eq!(prices["NVDA"], Some(dec!(186.50)));

        provider.reset_calls();
        let again = resolver.resolve_baselines(&symbols(&["NVDA"])).await;
        assert_eq!(again["NVDA"], Some(dec!(186.50)));
        assert!(provider.calls().is_empty());

        let stored = cache.get("stock:baselinePrices:2025-12-31").await.unwrap();
        assert_eq!(stored["NVDA"].as_f64(), Some(186.5));
    }

    #[tokio::test]
    async fn test_missing_exact_bar_widens_to_month() {
        let (resolver, provider, _) = setup();
        // Only an earlier December bar exists.
        provider.add_close("CRCL", date(2025, 12, 29), dec!(79.40));

        let prices = resolver.resolve_baselines(&symbols(&["CRCL"])).await;
        assert_eq!(prices["CRCL"], Some(dec!(79.40)));
    }

    #[tokio::test]
    async fn test_failed_symbol_is_none_and_others_resolve() {
        let (resolver, provider, _) = setup();
        provider.add_close("A", date(2025, 12, 31), dec!(10));
        provider.fail_closes("B", Failure::Unavailable);

        let prices = resolver.resolve_baselines(&symbols(&["A", "B"])).await;
        assert_eq!(prices["A"], Some(dec!(10)));
        assert_eq!(prices["B"], None);
    }

    #[tokio::test]
    async fn test_refetch_failure_keeps_cached_price() {
        let (resolver, provider, _) = setup();
        provider.add_close("A", date(2025, 12, 31), dec!(10));
        resolver.resolve_baselines(&symbols(&["A"])).await;

        provider.fail_closes("A", Failure::Unavailable);
        let prices = resolver.resolve_baselines(&symbols(&["A", "B"])).await;
        assert_eq!(prices["A"], Some(dec!(10)));
        assert_eq!(prices["B"], None);
    }

    #[tokio::test]
    async fn test_rate_limit_stops_remaining_fetches() {
        let (resolver, provider, _) = setup();
        provider.fail_closes("A", Failure::RateLimited);
        let gate = UpstreamGate::new();

        resolver
            .resolve_baselines_with_gate(&symbols(&["A"]), &gate)
            .await;
        assert!(gate.is_tripped());

        provider.reset_calls();
        let prices = resolver
            .resolve_baselines_with_gate(&symbols(&["B"]), &gate)
            .await;
        assert_eq!(prices["B"], None);
        assert!(provider.calls().is_empty());
    }
}
