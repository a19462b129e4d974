//! Permanent cache tier.
//!
//! Holds values that never change once known. Writes can only add
//! information: empty payloads are ignored and object payloads are merged so
//! a `null` never replaces a known field.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{is_empty_value, CacheEntry};

/// Merge `incoming` over `existing`.
///
/// Objects merge per field and `null` fields in `incoming` keep the existing
/// value. Any other shape replaces the existing value.
pub fn merge_permanent(existing: Option<&Value>, incoming: Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Object(current)), Value::Object(update)) => {
            let mut merged = current.clone();
            for (field, value) in update {
                if value.is_null() {
                    merged.entry(field).or_insert(Value::Null);
                } else {
                    merged.insert(field, value);
                }
            }
            Value::Object(merged)
        }
        (_, incoming) => incoming,
    }
}

/// Map of permanent entries, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct PermanentTier {
    entries: DashMap<String, Arc<CacheEntry>>,
    snapshot_path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl PermanentTier {
    /// Tier that lives for the process only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tier mirrored to `path`. Existing contents are loaded when readable;
    /// a missing or corrupt file starts the tier empty.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tier = Self {
            entries: DashMap::new(),
            snapshot_path: Some(path.clone()),
            persist_lock: Mutex::new(()),
        };
        tier.load(&path);
        tier
    }

    fn load(&self, path: &Path) {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("Failed to read permanent cache {}: {}", path.display(), e);
                return;
            }
        };

        match serde_json::from_str::<BTreeMap<String, CacheEntry>>(&raw) {
            Ok(entries) => {
                debug!(
                    "Loaded {} permanent entries from {}",
                    entries.len(),
                    path.display()
                );
                for (key, entry) in entries {
                    self.entries.insert(key, Arc::new(entry));
                }
            }
            Err(e) => warn!("Ignoring corrupt permanent cache {}: {}", path.display(), e),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Merge `value` into the entry for `key`.
    ///
    /// Returns the stored entry, or `None` when `value` is empty and nothing
    /// was written.
    pub async fn write(
        &self,
        key: &str,
        value: Value,
        now: DateTime<Utc>,
    ) -> Option<Arc<CacheEntry>> {
        if is_empty_value(&value) {
            debug!("Skipping empty permanent write for '{}'", key);
            return None;
        }

        let stored = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let merged = merge_permanent(Some(&occupied.get().value), value);
                let entry = Arc::new(CacheEntry::permanent(key, merged, now));
                occupied.insert(Arc::clone(&entry));
                entry
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(CacheEntry::permanent(key, value, now));
                vacant.insert(Arc::clone(&entry));
                entry
            }
        };

        self.persist().await;
        Some(stored)
    }

    /// Best-effort snapshot of every entry to the configured file.
    async fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let _guard = self.persist_lock.lock().await;

        let snapshot: BTreeMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().as_ref().clone()))
            .collect();

        let raw = match serde_json::to_string_pretty(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize permanent cache: {}", e);
                return;
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }

        let tmp = path.with_extension("json.tmp");
        let result = match tokio::fs::write(&tmp, raw).await {
            Ok(()) => tokio::fs::rename(&tmp, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to persist permanent cache to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_keeps_known_fields() {
        let existing = json!({"A": 100.0, "B": 50.0});
        let merged = merge_permanent(Some(&existing), json!({"A": null, "C": 12.5}));
        assert_eq!(merged, json!({"A": 100.0, "B": 50.0, "C": 12.5}));
    }

    #[test]
    fn test_merge_records_unknown_nulls() {
        let merged = merge_permanent(Some(&json!({"A": 1.0})), json!({"B": null}));
        assert_eq!(merged, json!({"A": 1.0, "B": null}));
    }

    #[tokio::test]
    async fn test_empty_write_is_skipped() {
        let tier = PermanentTier::new();
        assert!(tier.write("k", json!({}), now()).await.is_none());
        assert!(tier.write("k", Value::Null, now()).await.is_none());
        assert!(tier.get("k").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("baselines.json");

        let tier = PermanentTier::with_snapshot(&path);
        tier.write("stock:baselinePrices:2025-12-31", json!({"NVDA": 186.5}), now())
            .await
            .unwrap();
        drop(tier);

        let reloaded = PermanentTier::with_snapshot(&path);
        let entry = reloaded.get("stock:baselinePrices:2025-12-31").unwrap();
        assert_eq!(entry.value, json!({"NVDA": 186.5}));
        assert_eq!(entry.written_at, now());
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baselines.json");
        std::fs::write(&path, "not json").unwrap();

        let tier = PermanentTier::with_snapshot(&path);
        assert!(tier.get("anything").is_none());
    }
}
