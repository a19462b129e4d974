use std::sync::Arc;

use anyhow::Context;
use chrono::Datelike;
use leaderboard_core::{
    cache::{KvRestStore, NoRemoteStore, PermanentTier, RemoteStore},
    Clock, FreshnessPolicy, HolidayTable, JsonFileManagers, LeaderboardService,
    LeaderboardServiceTrait, MarketCalendar, SystemClock, TieredCache, TieredCacheConfig,
};
use leaderboard_market_data::YahooProvider;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub leaderboard_service: Arc<dyn LeaderboardServiceTrait + Send + Sync>,
    /// Bearer token required by the cron endpoint, when set.
    pub cron_secret: Option<String>,
}

pub fn init_tracing() {
    let log_format = std::env::var("LB_LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // `try_init` also routes `log` records from the library crates.
    let result = if log_format.eq_ignore_ascii_case("text") {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing already initialised: {}", e);
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let holidays = match &config.holidays_file {
        Some(path) => HolidayTable::from_json_file(path)
            .with_context(|| format!("Failed to load holidays from {}", path.display()))?,
        None => HolidayTable::nyse(),
    };
    let calendar = Arc::new(MarketCalendar::new(holidays));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    calendar.warn_if_uncovered(calendar.local_date(clock.now()).year());

    let remote: Arc<dyn RemoteStore> = match &config.kv_rest {
        Some(kv) => {
            tracing::info!("Remote cache tier enabled (writes: {})", config.kv_writes);
            Arc::new(KvRestStore::new(&kv.url, &kv.token, config.upstream_timeout))
        }
        None => Arc::new(NoRemoteStore),
    };
    let permanent = PermanentTier::with_snapshot(&config.baseline_file);
    tracing::info!("Baseline snapshot: {}", config.baseline_file.display());

    let cache = Arc::new(TieredCache::new(
        remote,
        permanent,
        calendar,
        FreshnessPolicy::default(),
        clock,
        TieredCacheConfig {
            remote_writes: config.kv_writes,
        },
    ));

    let provider = Arc::new(
        YahooProvider::new(config.upstream_timeout).context("Failed to build quote provider")?,
    );
    let managers = Arc::new(JsonFileManagers::new(&config.managers_path));
    tracing::info!("Manager roster: {}", config.managers_path.display());

    let leaderboard_service = Arc::new(
        LeaderboardService::new(managers, provider, cache)
            .with_anchor(config.anchor_date)
            .with_timeout(config.upstream_timeout),
    );

    Ok(Arc::new(AppState {
        leaderboard_service,
        cron_secret: config.cron_secret.clone(),
    }))
}
