//! Quote refresh orchestration.
//!
//! A refresh tries one batched upstream call, falls back to concurrent
//! per-symbol calls when the batch fails, and stops calling upstream for the
//! rest of the request once the provider reports a rate limit.

use futures::future::join_all;
use leaderboard_market_data::{MarketDataError, QuoteProvider, QuoteSnapshot, RetryClass};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{TieredCache, TtlHint};
use crate::constants::DEFAULT_UPSTREAM_TIMEOUT_SECS;
use crate::errors::Result;
use crate::freshness::DataKind;

/// Per-request switch that stops further upstream calls after a rate limit.
#[derive(Debug, Default)]
pub struct UpstreamGate {
    rate_limited: AtomicBool,
}

impl UpstreamGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.rate_limited.store(true, Ordering::Relaxed);
    }

    pub fn is_tripped(&self) -> bool {
        self.rate_limited.load(Ordering::Relaxed)
    }
}

/// Where a refresh ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    NotStarted,
    BatchAttempted,
    Success,
    BatchFailed,
    PerSymbolAttempted,
    PartialSuccess,
    TotalFailure,
}

/// Result of [`QuoteRefresher::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// One slot per requested symbol, in request order.
    pub quotes: Vec<Option<QuoteSnapshot>>,
    pub state: RefreshState,
    /// Every state the refresh passed through, ending with `state`.
    pub trail: Vec<RefreshState>,
    pub rate_limited: bool,
}

impl RefreshOutcome {
    fn finish(
        quotes: Vec<Option<QuoteSnapshot>>,
        state: RefreshState,
        mut trail: Vec<RefreshState>,
        rate_limited: bool,
    ) -> Self {
        trail.push(state);
        Self {
            quotes,
            state,
            trail,
            rate_limited,
        }
    }

    fn failed(len: usize, trail: Vec<RefreshState>, rate_limited: bool) -> Self {
        Self::finish(vec![None; len], RefreshState::TotalFailure, trail, rate_limited)
    }

    /// The caller should serve cached data instead of this outcome.
    pub fn prefer_cache(&self) -> bool {
        self.rate_limited || self.state == RefreshState::TotalFailure
    }

    pub fn usable_count(&self) -> usize {
        self.quotes.iter().filter(|q| q.is_some()).count()
    }
}

/// Run an upstream call under `timeout`, mapping expiry to
/// [`MarketDataError::Timeout`].
pub async fn bounded<T, F>(
    provider_id: &str,
    timeout: Duration,
    call: F,
) -> std::result::Result<T, MarketDataError>
where
    F: Future<Output = std::result::Result<T, MarketDataError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MarketDataError::Timeout {
            provider: provider_id.to_string(),
        }),
    }
}

/// Fetches live quotes and publishes computed results to the cache.
pub struct QuoteRefresher {
    provider: Arc<dyn QuoteProvider>,
    cache: Arc<TieredCache>,
    timeout: Duration,
}

impl QuoteRefresher {
    pub fn new(provider: Arc<dyn QuoteProvider>, cache: Arc<TieredCache>) -> Self {
        Self {
            provider,
            cache,
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    /// Fetch live quotes for `symbols`.
    pub async fn refresh(&self, symbols: &[String], gate: &UpstreamGate) -> RefreshOutcome {
        let mut trail = vec![RefreshState::NotStarted];
        if symbols.is_empty() {
            return RefreshOutcome::finish(Vec::new(), RefreshState::Success, trail, false);
        }
        if gate.is_tripped() {
            debug!("Upstream gate closed; skipping quote refresh");
            return RefreshOutcome::failed(symbols.len(), trail, true);
        }

        debug!("Batch quote refresh for {} symbols", symbols.len());
        trail.push(RefreshState::BatchAttempted);
        let batch = bounded(
            self.provider.id(),
            self.timeout,
            self.provider.latest_quotes(symbols),
        )
        .await;

        match batch {
            Ok(snapshots) => {
                let quotes = align(symbols, snapshots);
                let state = if quotes.iter().all(Option::is_some) {
                    RefreshState::Success
                } else {
                    RefreshState::PartialSuccess
                };
                let outcome = RefreshOutcome::finish(quotes, state, trail, false);
                info!(
                    "Batch quote refresh {:?}: {}/{} symbols",
                    outcome.state,
                    outcome.usable_count(),
                    symbols.len()
                );
                outcome
            }
            Err(e) if e.retry_class() == RetryClass::PreferCache => {
                gate.trip();
                warn!("Quote provider rate limited on batch; preferring cache");
                RefreshOutcome::failed(symbols.len(), trail, true)
            }
            Err(e) => {
                warn!("Batch quote fetch failed: {}", e);
                trail.push(RefreshState::BatchFailed);
                self.refresh_each(symbols, gate, trail).await
            }
        }
    }

    async fn refresh_each(
        &self,
        symbols: &[String],
        gate: &UpstreamGate,
        mut trail: Vec<RefreshState>,
    ) -> RefreshOutcome {
        debug!("Per-symbol quote refresh for {} symbols", symbols.len());
        trail.push(RefreshState::PerSymbolAttempted);

        let calls = symbols.iter().map(|symbol| async move {
            if gate.is_tripped() {
                return None;
            }
            let result = bounded(
                self.provider.id(),
                self.timeout,
                self.provider.latest_quote(symbol),
            )
            .await;
            match result {
                Ok(quote) if quote.is_usable() => Some(quote),
                Ok(_) => {
                    debug!("Quote for {} has no price", symbol);
                    None
                }
                Err(e) => {
                    match e.retry_class() {
                        RetryClass::PreferCache => {
                            gate.trip();
                            warn!("Rate limited fetching {}; stopping upstream calls", symbol);
                        }
                        RetryClass::Never => debug!("No quote for {}: {}", symbol, e),
                        RetryClass::PerSymbol => warn!("Quote fetch failed for {}: {}", symbol, e),
                    }
                    None
                }
            }
        });

        let quotes = join_all(calls).await;
        let rate_limited = gate.is_tripped();
        let state = if quotes.iter().any(Option::is_some) {
            RefreshState::PartialSuccess
        } else {
            RefreshState::TotalFailure
        };

        let outcome = RefreshOutcome::finish(quotes, state, trail, rate_limited);
        info!(
            "Per-symbol quote refresh {:?}: {}/{} symbols",
            outcome.state,
            outcome.usable_count(),
            symbols.len()
        );
        outcome
    }

    /// Write a computed result under the TTL for `kind`.
    pub async fn publish<T: Serialize>(&self, key: &str, value: &T, kind: DataKind) -> Result<()> {
        self.cache.set_as(key, value, TtlHint::Ephemeral(kind)).await
    }

    /// Serve `key` from cache when fresh; otherwise run `fetch`.
    pub async fn serve<T, F, Fut>(&self, key: &str, kind: DataKind, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(cached) = self.cache.get_as::<T>(key).await {
            return Ok(cached);
        }
        self.refresh_and_publish(key, kind, fetch).await
    }

    /// Run `fetch` and publish its result.
    ///
    /// `Ok(None)` from `fetch` means nothing usable was produced. That and any
    /// error fall back to the last known value for `key`.
    pub async fn refresh_and_publish<T, F, Fut>(
        &self,
        key: &str,
        kind: DataKind,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match fetch().await {
            Ok(Some(value)) => {
                self.publish(key, &value, kind).await?;
                Ok(value)
            }
            Ok(None) => {
                warn!("Refresh of '{}' produced no usable data", key);
                self.cache.stale_or_unavailable(key).await
            }
            Err(e) => {
                warn!("Refresh of '{}' failed: {}", key, e);
                self.cache.stale_or_unavailable(key).await
            }
        }
    }
}

/// Line batch results up with the request; unknown or priceless symbols
/// become `None`.
fn align(symbols: &[String], snapshots: Vec<QuoteSnapshot>) -> Vec<Option<QuoteSnapshot>> {
    let mut by_symbol: HashMap<String, QuoteSnapshot> = snapshots
        .into_iter()
        .filter(QuoteSnapshot::is_usable)
        .map(|q| (q.symbol.to_uppercase(), q))
        .collect();

    symbols
        .iter()
        .map(|symbol| by_symbol.remove(&symbol.to_uppercase()))
        .collect()
}
