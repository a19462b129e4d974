//! Tiered cache for dashboard payloads.
//!
//! Three tiers sit behind one [`TieredCache`]:
//! - `memory` - per-process map of short-lived computed results
//! - `remote` - shared key-value store, read-mostly
//! - `permanent` - values that never change once known (baseline prices)

mod memory;
mod permanent;
mod remote;
mod store;

pub use memory::MemoryTier;
pub use permanent::{merge_permanent, PermanentTier};
pub use remote::{KvRestStore, NoRemoteStore, RemoteEntry, RemoteStore};
pub use store::{TieredCache, TieredCacheConfig};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::freshness::DataKind;

/// Lifetime class of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TtlClass {
    Ephemeral,
    Permanent,
}

/// What the caller is writing, so the store can pick a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlHint {
    /// Computed result; TTL comes from the freshness policy for this kind.
    Ephemeral(DataKind),
    /// Never expires.
    Permanent,
}

/// One cached value with its write metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub written_at: DateTime<Utc>,
    pub ttl_class: TtlClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn ephemeral(key: &str, value: Value, written_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            value,
            written_at,
            ttl_class: TtlClass::Ephemeral,
            expires_at: Some(written_at + ttl),
        }
    }

    pub fn permanent(key: &str, value: Value, written_at: DateTime<Utc>) -> Self {
        Self {
            key: key.to_string(),
            value,
            written_at,
            ttl_class: TtlClass::Permanent,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

/// `null`, `{}` and `[]` carry no information.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
