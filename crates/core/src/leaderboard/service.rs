use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use futures::future::join_all;
use leaderboard_market_data::{BarInterval, MarketDataError, QuoteProvider, QuoteSnapshot};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use super::compute::{
    close_on_or_before, lookback_date, month_labels, one_day_change, percent_change,
    series_points, sort_by_ytd,
};
use super::model::{
    BenchmarkRecord, ChartSeries, ManagerAnalysis, PerformanceRecord, RefreshSummary, SeriesLine,
};
use crate::baseline::{BaselinePrices, BaselineResolver};
use crate::cache::TieredCache;
use crate::calendar::EXCHANGE_TZ;
use crate::constants::{
    BENCHMARKS_KEY, BENCHMARK_INDEXES, CURRENT_STANDINGS_KEY, DEFAULT_UPSTREAM_TIMEOUT_SECS,
    PERFORMANCE_SERIES_KEY,
};
use crate::errors::{Error, Result};
use crate::freshness::DataKind;
use crate::managers::{Manager, ManagerSource};
use crate::refresh::{bounded, QuoteRefresher, UpstreamGate};

/// Dashboard reads and the scheduled refresh.
#[async_trait]
pub trait LeaderboardServiceTrait: Send + Sync {
    /// Managers ranked by year-to-date performance.
    async fn current_standings(&self) -> Result<Vec<PerformanceRecord>>;

    /// Year-to-date chart, one line per manager.
    async fn performance_series(&self) -> Result<ChartSeries>;

    async fn benchmarks(&self) -> Result<Vec<BenchmarkRecord>>;

    async fn analyses(&self) -> Result<BTreeMap<String, ManagerAnalysis>>;

    /// True while the market is open and the cached standings are stale.
    async fn needs_refresh(&self) -> bool;

    /// Recompute the standings now, ignoring the cached copy.
    async fn refresh_current(&self) -> RefreshSummary;
}

/// Reference closes used for the 1-month and 3-month columns.
#[derive(Debug, Clone, Copy, Default)]
struct LookbackCloses {
    one_month: Option<Decimal>,
    three_months: Option<Decimal>,
}

pub struct LeaderboardService {
    managers: Arc<dyn ManagerSource>,
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<TieredCache>,
    refresher: QuoteRefresher,
    baselines: BaselineResolver,
    timeout: Duration,
}

impl LeaderboardService {
    pub fn new(
        managers: Arc<dyn ManagerSource>,
        provider: Arc<dyn QuoteProvider>,
        cache: Arc<TieredCache>,
    ) -> Self {
        let timeout = Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS);
        Self {
            refresher: QuoteRefresher::new(provider.clone(), cache.clone()),
            baselines: BaselineResolver::new(provider.clone(), cache.clone()),
            managers,
            provider,
            cache,
            timeout,
        }
    }

    /// Pin the baseline anchor date.
    pub fn with_anchor(mut self, anchor: Option<NaiveDate>) -> Self {
        self.baselines = self.baselines.with_anchor(anchor);
        self
    }

    /// Bound every upstream call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.refresher = self.refresher.with_timeout(timeout);
        self.baselines = self.baselines.with_timeout(timeout);
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    pub fn baselines(&self) -> &BaselineResolver {
        &self.baselines
    }

    async fn compute_standings(
        &self,
        managers: &[Manager],
    ) -> Result<Option<Vec<PerformanceRecord>>> {
        if managers.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let symbols = unique_symbols(managers.iter().map(|m| m.stock_symbol.as_str()));
        let gate = UpstreamGate::new();

        let outcome = self.refresher.refresh(&symbols, &gate).await;
        if outcome.rate_limited {
            return Err(self.rate_limited());
        }
        if outcome.prefer_cache() {
            return Ok(None);
        }
        let quotes = zip_quotes(&symbols, outcome.quotes);

        let baselines = self
            .baselines
            .resolve_baselines_with_gate(&symbols, &gate)
            .await;
        let lookbacks = self.lookback_closes(&symbols, &gate).await;

        let mut records: Vec<PerformanceRecord> = managers
            .iter()
            .filter_map(|manager| {
                let symbol = &manager.stock_symbol;
                let quote = quotes.get(symbol)?;
                let baseline = baselines.get(symbol).copied().flatten();
                if baseline.is_none() {
                    debug!("Dropping {} from standings: no baseline", symbol);
                    return None;
                }
                let lookback = lookbacks.get(symbol).copied().unwrap_or_default();
                let price = quote.price;

                Some(PerformanceRecord {
                    name: manager.name.clone(),
                    symbol: symbol.clone(),
                    current_price: price,
                    change_percent: percent_change(baseline, price),
                    change_1d: one_day_change(price, quote.previous_close, baseline),
                    change_1m: percent_change(lookback.one_month, price),
                    change_3m: percent_change(lookback.three_months, price),
                    analysis: manager.analysis.clone(),
                })
            })
            .collect();

        if records.is_empty() {
            return Ok(None);
        }
        sort_by_ytd(&mut records);
        info!(
            "Computed standings for {}/{} managers",
            records.len(),
            managers.len()
        );
        Ok(Some(records))
    }

    /// One daily-close range per symbol covering both lookback dates.
    ///
    /// A lookback date before the baseline anchor gets no reference close.
    async fn lookback_closes(
        &self,
        symbols: &[String],
        gate: &UpstreamGate,
    ) -> HashMap<String, LookbackCloses> {
        let today = self.cache.calendar().local_date(self.cache.now());
        let anchor = self.baselines.anchor();
        let one_month = lookback_date(today, 1).filter(|d| *d >= anchor);
        let three_months = lookback_date(today, 3).filter(|d| *d >= anchor);

        let Some(earliest) = three_months.or(one_month) else {
            return HashMap::new();
        };
        // Widen so a lookback landing on a weekend or holiday still finds a close.
        let start = earliest - ChronoDuration::days(7);

        let fetches = symbols.iter().map(|symbol| async move {
            if gate.is_tripped() {
                return (symbol.clone(), LookbackCloses::default());
            }
            let result = bounded(
                self.provider.id(),
                self.timeout,
                self.provider.historical_closes(symbol, start, today),
            )
            .await;

            let closes = match result {
                Ok(closes) => closes,
                Err(e) => {
                    if e.is_rate_limited() {
                        gate.trip();
                    }
                    warn!("Lookback closes failed for {}: {}", symbol, e);
                    Vec::new()
                }
            };

            let lookback = LookbackCloses {
                one_month: one_month.and_then(|d| close_on_or_before(&closes, d)),
                three_months: three_months.and_then(|d| close_on_or_before(&closes, d)),
            };
            (symbol.clone(), lookback)
        });

        join_all(fetches).await.into_iter().collect()
    }

    /// Chart lines from hourly bars since the first session of the year.
    ///
    /// A series with no points is still a result when every fetch
    /// succeeded. `Ok(None)` means a fetch failed and nothing was drawn.
    async fn compute_series(&self, managers: &[Manager]) -> Result<Option<ChartSeries>> {
        let now = self.cache.now();
        let calendar = self.cache.calendar();
        let today = calendar.local_date(now);
        let months = month_labels(today);

        let since = calendar
            .first_trading_day_of_year(today.year())
            .and_then(exchange_midnight)
            .filter(|since| *since <= now);
        let Some(since) = since else {
            debug!("No trading day yet this year; chart has no points");
            return Ok(Some(ChartSeries {
                months,
                data: managers.iter().map(empty_line).collect(),
            }));
        };

        let symbols = unique_symbols(managers.iter().map(|m| m.stock_symbol.as_str()));
        let gate = UpstreamGate::new();
        let baselines = self
            .baselines
            .resolve_baselines_with_gate(&symbols, &gate)
            .await;

        let lines = managers.iter().map(|manager| {
            let baselines = &baselines;
            let gate = &gate;
            async move {
                let mut line = empty_line(manager);
                let Some(baseline) = baselines.get(&manager.stock_symbol).copied().flatten()
                else {
                    return (line, true);
                };
                if gate.is_tripped() {
                    return (line, true);
                }

                let result = bounded(
                    self.provider.id(),
                    self.timeout,
                    self.provider.intraday_bars(
                        &manager.stock_symbol,
                        since,
                        now,
                        BarInterval::OneHour,
                    ),
                )
                .await;

                match result {
                    Ok(bars) => {
                        let (data, timestamps) = series_points(&bars, baseline, since, calendar);
                        line.data = data;
                        line.timestamps = timestamps;
                        (line, false)
                    }
                    Err(e) => {
                        if e.is_rate_limited() {
                            gate.trip();
                        }
                        warn!("Hourly bars failed for {}: {}", manager.stock_symbol, e);
                        (line, true)
                    }
                }
            }
        });

        let (data, failures): (Vec<SeriesLine>, Vec<bool>) =
            join_all(lines).await.into_iter().unzip();
        let series = ChartSeries { months, data };
        let failed = failures.iter().any(|f| *f);

        if series.has_points() || !failed {
            return Ok(Some(series));
        }
        if gate.is_tripped() {
            return Err(self.rate_limited());
        }
        Ok(None)
    }

    async fn compute_benchmarks(&self) -> Result<Option<Vec<BenchmarkRecord>>> {
        let symbols: Vec<String> = BENCHMARK_INDEXES
            .iter()
            .map(|(symbol, _)| symbol.to_string())
            .collect();
        let gate = UpstreamGate::new();

        let outcome = self.refresher.refresh(&symbols, &gate).await;
        if outcome.rate_limited {
            return Err(self.rate_limited());
        }
        if outcome.prefer_cache() {
            return Ok(None);
        }
        let quotes = zip_quotes(&symbols, outcome.quotes);
        let baselines = self
            .baselines
            .resolve_baselines_with_gate(&symbols, &gate)
            .await;

        let records: Vec<BenchmarkRecord> = BENCHMARK_INDEXES
            .iter()
            .map(|(symbol, name)| match quotes.get(*symbol) {
                Some(quote) => benchmark_record(symbol, name, quote, &baselines),
                None => BenchmarkRecord::placeholder(symbol, name),
            })
            .collect();

        if !records.iter().any(BenchmarkRecord::has_price) {
            return Ok(None);
        }
        Ok(Some(records))
    }

    fn rate_limited(&self) -> Error {
        Error::MarketData(MarketDataError::RateLimited {
            provider: self.provider.id().to_string(),
        })
    }
}

#[async_trait]
impl LeaderboardServiceTrait for LeaderboardService {
    async fn current_standings(&self) -> Result<Vec<PerformanceRecord>> {
        let managers = self.managers.load_managers().await?;
        self.refresher
            .serve(CURRENT_STANDINGS_KEY, DataKind::LiveQuotes, || {
                self.compute_standings(&managers)
            })
            .await
    }

    async fn performance_series(&self) -> Result<ChartSeries> {
        let managers = self.managers.load_managers().await?;
        self.refresher
            .serve(PERFORMANCE_SERIES_KEY, DataKind::ChartSeries, || {
                self.compute_series(&managers)
            })
            .await
    }

    async fn benchmarks(&self) -> Result<Vec<BenchmarkRecord>> {
        self.refresher
            .serve(BENCHMARKS_KEY, DataKind::Benchmarks, || {
                self.compute_benchmarks()
            })
            .await
    }

    async fn analyses(&self) -> Result<BTreeMap<String, ManagerAnalysis>> {
        let managers = self.managers.load_managers().await?;
        Ok(managers
            .into_iter()
            .filter_map(|m| {
                let analysis = m.analysis.filter(|a| !a.trim().is_empty())?;
                Some((
                    m.name,
                    ManagerAnalysis {
                        stock_symbol: m.stock_symbol,
                        analysis,
                    },
                ))
            })
            .collect())
    }

    async fn needs_refresh(&self) -> bool {
        self.cache.is_market_open() && !self.cache.should_use_cache(CURRENT_STANDINGS_KEY).await
    }

    async fn refresh_current(&self) -> RefreshSummary {
        if !self.cache.is_market_open() {
            info!("Market closed; skipping scheduled refresh");
            return RefreshSummary::Skipped;
        }

        let managers = match self.managers.load_managers().await {
            Ok(managers) => managers,
            Err(e) => {
                return RefreshSummary::Failed {
                    reason: e.to_string(),
                }
            }
        };

        let summary = match self.compute_standings(&managers).await {
            Ok(Some(records)) => {
                match self
                    .refresher
                    .publish(CURRENT_STANDINGS_KEY, &records, DataKind::LiveQuotes)
                    .await
                {
                    Ok(()) => RefreshSummary::Refreshed {
                        records: records.len(),
                    },
                    Err(e) => RefreshSummary::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            Ok(None) => RefreshSummary::Failed {
                reason: "no usable quotes".to_string(),
            },
            Err(e) => RefreshSummary::Failed {
                reason: e.to_string(),
            },
        };

        info!("Scheduled refresh finished: {:?}", summary);
        summary
    }
}

fn empty_line(manager: &Manager) -> SeriesLine {
    SeriesLine {
        name: manager.name.clone(),
        symbol: manager.stock_symbol.clone(),
        data: Vec::new(),
        timestamps: Vec::new(),
    }
}

fn unique_symbols<'a>(symbols: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for symbol in symbols {
        if !unique.iter().any(|s| s == symbol) {
            unique.push(symbol.to_string());
        }
    }
    unique
}

fn zip_quotes(
    symbols: &[String],
    quotes: Vec<Option<QuoteSnapshot>>,
) -> HashMap<String, QuoteSnapshot> {
    symbols
        .iter()
        .cloned()
        .zip(quotes)
        .filter_map(|(symbol, quote)| quote.map(|q| (symbol, q)))
        .collect()
}

fn benchmark_record(
    symbol: &str,
    name: &str,
    quote: &QuoteSnapshot,
    baselines: &BaselinePrices,
) -> BenchmarkRecord {
    let baseline = baselines.get(symbol).copied().flatten();
    BenchmarkRecord {
        symbol: symbol.to_string(),
        name: name.to_string(),
        current_price: quote.price,
        change_percent: percent_change(baseline, quote.price),
        change_1d: one_day_change(quote.price, quote.previous_close, baseline),
    }
}

/// Midnight at the exchange on `date`, as UTC.
fn exchange_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .and_local_timezone(EXCHANGE_TZ)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
