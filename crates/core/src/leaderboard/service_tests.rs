//! Tests for LeaderboardService.
//!
//! # Contract points
//!
//! 1. Standings: sorted by YTD, rows without a price or baseline dropped
//! 2. Fresh cache short-circuits every upstream call
//! 3. Failures serve the last published payload, or NoCacheAvailable
//! 4. Benchmarks keep placeholder rows
//! 5. Scheduled refresh is skipped while the market is closed

#[cfg(test)]
mod tests {
    use crate::cache::TieredCache;
    use crate::calendar::{MarketCalendar, EXCHANGE_TZ};
    use crate::clock::ManualClock;
    use crate::errors::Error;
    use crate::leaderboard::{LeaderboardService, LeaderboardServiceTrait, RefreshSummary};
    use crate::managers::{Manager, StaticManagers};
    use crate::test_support::{Failure, MockProvider};
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        EXCHANGE_TZ
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn manager(name: &str, symbol: &str, analysis: Option<&str>) -> Manager {
        Manager {
            name: name.to_string(),
            stock_symbol: symbol.to_string(),
            analysis: analysis.map(str::to_string),
        }
    }

    fn setup(now: DateTime<Utc>) -> (LeaderboardService, MockProvider, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let cache = Arc::new(TieredCache::in_memory(
            Arc::new(MarketCalendar::us_equities()),
            clock.clone(),
        ));
        let provider = MockProvider::new();
        let managers = StaticManagers(vec![
            manager("Ada", "A", Some("Long compute")),
            manager("Bea", "B", None),
            manager("Cy", "C", Some("  ")),
        ]);
        let service =
            LeaderboardService::new(Arc::new(managers), Arc::new(provider.clone()), cache);
        (service, provider, clock)
    }

    fn seed_standings(provider: &MockProvider) {
        provider.add_quote("A", dec!(110), Some(dec!(100)));
        provider.add_quote("B", dec!(90), None);
        provider.add_quote("C", dec!(50), None);
        provider.add_close("A", date(2025, 12, 31), dec!(100));
        provider.add_close("A", date(2026, 1, 15), dec!(105));
        provider.add_close("A", date(2026, 3, 13), dec!(100));
        provider.add_close("B", date(2025, 12, 31), dec!(100));
    }

    #[tokio::test]
    async fn test_current_standings_computes_and_sorts() {
        // Wednesday, market open.
        let (service, provider, _) = setup(ny(2026, 4, 15, 11, 0));
        seed_standings(&provider);

        let records = service.current_standings().await.unwrap();
        assert_eq!(records.len(), 2);

        let a = &records[0];
        assert_eq!(a.symbol, "A");
        assert_eq!(a.change_percent, Some(dec!(10)));
        assert_eq!(a.change_1d, Some(dec!(10)));
        assert_eq!(a.change_1m, Some(dec!(10)));
        assert_eq!(a.change_3m, Some(dec!(4.7619)));
        assert_eq!(a.analysis.as_deref(), Some("Long compute"));

        let b = &records[1];
        assert_eq!(b.symbol, "B");
        assert_eq!(b.change_percent, Some(dec!(-10)));
        assert_eq!(b.change_1d, Some(dec!(-10)));
        assert_eq!(b.change_1m, None);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_upstream() {
        let (service, provider, clock) = setup(ny(2026, 4, 15, 11, 0));
        seed_standings(&provider);
        service.current_standings().await.unwrap();

        provider.reset_calls();
        clock.advance(Duration::minutes(10));
        service.current_standings().await.unwrap();
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_serves_previous_standings() {
        let (service, provider, clock) = setup(ny(2026, 4, 15, 11, 0));
        seed_standings(&provider);
        let first = service.current_standings().await.unwrap();

        clock.advance(Duration::minutes(20));
        provider.reset_calls();
        provider.fail_batch(Some(Failure::RateLimited));

        let served = service.current_standings().await.unwrap();
        assert_eq!(served, first);
        assert_eq!(provider.calls(), vec!["batch:A,B,C".to_string()]);
    }

    #[tokio::test]
    async fn test_no_history_and_failure_is_no_cache_available() {
        let (service, provider, _) = setup(ny(2026, 4, 15, 11, 0));
        provider.fail_batch(Some(Failure::Unavailable));

        let err = service.current_standings().await.unwrap_err();
        assert!(matches!(err, Error::NoCacheAvailable(ref key) if key == "stock:current"));
    }

    #[tokio::test]
    async fn test_benchmarks_keep_placeholders() {
        let (service, provider, _) = setup(ny(2026, 4, 15, 11, 0));
        provider.add_quote("SPY", dec!(660), Some(dec!(650)));
        provider.add_close("SPY", date(2025, 12, 31), dec!(600));

        let records = service.benchmarks().await.unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].symbol, "SPY");
        assert_eq!(records[0].change_percent, Some(dec!(10)));
        assert_eq!(records[1].symbol, "QQQ");
        assert_eq!(records[1].current_price, None);
        assert_eq!(records[3].name, "US Dollar");
    }

    #[tokio::test]
    async fn test_performance_series_from_hourly_bars() {
        // Tuesday 2026-01-06; first trading day of the year is Friday 01-02.
        let (service, provider, _) = setup(ny(2026, 1, 6, 11, 0));
        provider.add_close("A", date(2025, 12, 31), dec!(100));
        provider.add_bar("A", ny(2026, 1, 2, 9, 30), dec!(100), dec!(101));
        provider.add_bar("A", ny(2026, 1, 3, 10, 30), dec!(200), dec!(200));

        let series = service.performance_series().await.unwrap();
        assert_eq!(series.months, vec!["Jan 6".to_string()]);
        assert_eq!(series.data.len(), 3);

        let line = &series.data[0];
        assert_eq!(line.symbol, "A");
        assert_eq!(line.data, vec![dec!(0), dec!(1)]);
        assert_eq!(
            line.timestamps,
            vec![
                ny(2026, 1, 2, 9, 0).timestamp_millis(),
                ny(2026, 1, 2, 9, 30).timestamp_millis()
            ]
        );
        assert!(series.data[1].data.is_empty());
    }

    #[tokio::test]
    async fn test_series_without_bars_yet_is_empty_not_unavailable() {
        // First session of 2026, before the open.
        let (service, provider, _) = setup(ny(2026, 1, 2, 8, 0));
        for symbol in ["A", "B", "C"] {
            provider.add_close(symbol, date(2025, 12, 31), dec!(100));
        }

        let series = service.performance_series().await.unwrap();
        assert_eq!(series.months, vec!["Jan 2".to_string()]);
        assert_eq!(series.data.len(), 3);
        assert!(!series.has_points());
        assert_eq!(provider.count_calls("bars:"), 3);
    }

    #[tokio::test]
    async fn test_series_before_first_session_skips_upstream() {
        // New Year's Day holiday.
        let (service, provider, _) = setup(ny(2026, 1, 1, 12, 0));

        let series = service.performance_series().await.unwrap();
        assert_eq!(series.months, vec!["Jan 1".to_string()]);
        let symbols: Vec<&str> = series.data.iter().map(|l| l.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_series_with_failed_baselines_is_unavailable() {
        let (service, _, _) = setup(ny(2026, 1, 6, 11, 0));
        let err = service.performance_series().await.unwrap_err();
        assert!(matches!(err, Error::NoCacheAvailable(ref key) if key == "stock:monthly"));
    }

    #[tokio::test]
    async fn test_analyses_skip_blank_text() {
        let (service, _, _) = setup(ny(2026, 4, 15, 11, 0));
        let analyses = service.analyses().await.unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses["Ada"].stock_symbol, "A");
        assert_eq!(analyses["Ada"].analysis, "Long compute");
    }

    #[tokio::test]
    async fn test_refresh_current_skipped_when_closed() {
        // Saturday
        let (service, provider, _) = setup(ny(2026, 4, 18, 11, 0));
        seed_standings(&provider);
        assert_eq!(service.refresh_current().await, RefreshSummary::Skipped);
        assert!(!service.needs_refresh().await);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_current_ignores_fresh_cache() {
        let (service, provider, _) = setup(ny(2026, 4, 15, 11, 0));
        seed_standings(&provider);
        assert!(service.needs_refresh().await);

        service.current_standings().await.unwrap();
        assert!(!service.needs_refresh().await);

        provider.reset_calls();
        assert_eq!(
            service.refresh_current().await,
            RefreshSummary::Refreshed { records: 2 }
        );
        assert_eq!(provider.count_calls("batch:"), 1);
    }
}
