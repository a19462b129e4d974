use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::{
    is_empty_value, CacheEntry, MemoryTier, NoRemoteStore, PermanentTier, RemoteEntry,
    RemoteStore, TtlHint,
};
use crate::calendar::MarketCalendar;
use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::freshness::FreshnessPolicy;

/// Store-level switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TieredCacheConfig {
    /// Mirror ephemeral writes to the remote tier.
    pub remote_writes: bool,
}

/// Read-through cache over the memory, remote and permanent tiers.
///
/// Reads go permanent -> memory -> remote and only return values the
/// freshness policy accepts. [`TieredCache::last_known`] ignores freshness and
/// is what callers fall back to when a refresh fails.
pub struct TieredCache {
    memory: MemoryTier,
    permanent: PermanentTier,
    remote: Arc<dyn RemoteStore>,
    calendar: Arc<MarketCalendar>,
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
    config: TieredCacheConfig,
}

impl TieredCache {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        permanent: PermanentTier,
        calendar: Arc<MarketCalendar>,
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
        config: TieredCacheConfig,
    ) -> Self {
        Self {
            memory: MemoryTier::new(),
            permanent,
            remote,
            calendar,
            policy,
            clock,
            config,
        }
    }

    /// Process-local cache with no remote tier and the default policy.
    pub fn in_memory(calendar: Arc<MarketCalendar>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(NoRemoteStore),
            PermanentTier::new(),
            calendar,
            FreshnessPolicy::default(),
            clock,
            TieredCacheConfig::default(),
        )
    }

    pub fn calendar(&self) -> &MarketCalendar {
        &self.calendar
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_market_open(&self) -> bool {
        self.calendar.is_market_open(self.clock.now())
    }

    /// Fresh value for `key`, or `None`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.permanent.get(key) {
            if !is_empty_value(&entry.value) {
                debug!("Cache hit (permanent) for '{}'", key);
                return Some(entry.value.clone());
            }
        }

        let now = self.clock.now();
        let market_open = self.calendar.is_market_open(now);
        let local = self.memory.get(key);

        if let Some(entry) = &local {
            if self
                .policy
                .should_use_cache(Some(entry.written_at), now, market_open)
                && !entry.is_expired(now)
            {
                debug!("Cache hit (memory) for '{}'", key);
                return Some(entry.value.clone());
            }
        }

        if let Some(remote) = self.remote_get(key).await {
            // Entries other clients wrote without a timestamp are bounded by
            // the store's own expiry.
            let written_at = remote.written_at.unwrap_or(now);
            if self
                .policy
                .should_use_cache(Some(written_at), now, market_open)
            {
                debug!("Cache hit (remote) for '{}'", key);
                self.promote(key, &remote.value, written_at, local.as_deref(), market_open);
                return Some(remote.value);
            }
        }

        debug!("Cache miss for '{}'", key);
        None
    }

    /// Most recent value for `key` from any tier, fresh or not.
    pub async fn last_known(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.permanent.get(key) {
            if !is_empty_value(&entry.value) {
                return Some(entry.value.clone());
            }
        }

        let local = self.memory.get(key);
        let remote = self.remote_get(key).await;

        match (local, remote) {
            (Some(local), Some(remote)) => match remote.written_at {
                Some(remote_at) if remote_at > local.written_at => Some(remote.value),
                _ => Some(local.value.clone()),
            },
            (Some(local), None) => Some(local.value.clone()),
            (None, Some(remote)) => Some(remote.value),
            (None, None) => None,
        }
    }

    /// When `key` was last written, per the memory tier then the remote tier.
    pub async fn last_update(&self, key: &str) -> Option<DateTime<Utc>> {
        if let Some(entry) = self.memory.get(key) {
            return Some(entry.written_at);
        }
        self.remote_get(key).await.and_then(|r| r.written_at)
    }

    /// Whether the value behind `key` is fresh enough to skip a refresh.
    pub async fn should_use_cache(&self, key: &str) -> bool {
        let last_update = self.last_update(key).await;
        let now = self.clock.now();
        self.policy
            .should_use_cache(last_update, now, self.calendar.is_market_open(now))
    }

    /// Store `value` under `key`.
    ///
    /// Ephemeral writes land in memory at once and are mirrored to the remote
    /// tier when enabled; remote failures are logged only. Permanent writes
    /// merge into the permanent tier and skip empty values.
    pub async fn set(&self, key: &str, value: Value, hint: TtlHint) {
        let now = self.clock.now();
        match hint {
            TtlHint::Ephemeral(kind) => {
                let ttl = self
                    .policy
                    .ttl_for(kind, self.calendar.is_market_open(now));
                self.memory
                    .insert(CacheEntry::ephemeral(key, value.clone(), now, ttl));

                if self.config.remote_writes {
                    let entry = RemoteEntry {
                        value,
                        written_at: Some(now),
                    };
                    if let Err(e) = self.remote.set(key, &entry, Some(ttl)).await {
                        warn!(
                            "Remote write to {} failed for '{}': {}",
                            self.remote.id(),
                            key,
                            e
                        );
                    }
                }
            }
            TtlHint::Permanent => {
                self.permanent.write(key, value, now).await;
            }
        }
    }

    /// Typed [`TieredCache::get`]. A value that fails to decode is a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        decode(key, value)
    }

    /// Typed [`TieredCache::last_known`].
    pub async fn last_known_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.last_known(key).await?;
        decode(key, value)
    }

    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T, hint: TtlHint) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, hint).await;
        Ok(())
    }

    /// Last known value for `key`, or [`Error::NoCacheAvailable`].
    pub async fn stale_or_unavailable<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        match self.last_known_as::<T>(key).await {
            Some(value) => {
                warn!("Serving stale cache for '{}'", key);
                Ok(value)
            }
            None => {
                error!("No cached data to fall back to for '{}'", key);
                Err(Error::NoCacheAvailable(key.to_string()))
            }
        }
    }

    async fn remote_get(&self, key: &str) -> Option<RemoteEntry> {
        match self.remote.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Remote read from {} failed for '{}': {}", self.remote.id(), key, e);
                None
            }
        }
    }

    /// Copy a remote hit into memory when it is newer than the local copy.
    fn promote(
        &self,
        key: &str,
        value: &Value,
        written_at: DateTime<Utc>,
        local: Option<&CacheEntry>,
        market_open: bool,
    ) {
        if local.is_some_and(|l| l.written_at >= written_at) {
            return;
        }
        let ttl = self.policy.max_age(market_open);
        self.memory
            .insert(CacheEntry::ephemeral(key, value.clone(), written_at, ttl));
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!("Cached value for '{}' has an unexpected shape: {}", key, e);
            None
        }
    }
}
