//! Shared remote cache tier.
//!
//! The remote tier lets several server instances share computed results. It
//! is optional: without a configured store every read misses and every write
//! is dropped.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};

/// Value read from or written to the remote tier.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub value: Value,
    /// Absent for values written by clients that do not record it.
    pub written_at: Option<DateTime<Utc>>,
}

/// Shared key-value store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn id(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>>;

    async fn set(&self, key: &str, entry: &RemoteEntry, ttl: Option<Duration>) -> Result<()>;
}

/// Stand-in used when no remote store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemoteStore;

#[async_trait]
impl RemoteStore for NoRemoteStore {
    fn id(&self) -> &'static str {
        "NONE"
    }

    async fn get(&self, _key: &str) -> Result<Option<RemoteEntry>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _entry: &RemoteEntry, _ttl: Option<Duration>) -> Result<()> {
        Ok(())
    }
}

/// Stored representation: the payload plus its write time.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    data: Value,
    #[serde(default)]
    written_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for a Redis-over-REST store (Upstash / Vercel KV protocol).
pub struct KvRestStore {
    client: Client,
    base_url: String,
    token: String,
}

impl KvRestStore {
    pub fn new(base_url: &str, token: &str, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    async fn read_response(&self, response: reqwest::Response) -> Result<RestResponse> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RemoteStore("KV store rate limited".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteStore(format!("HTTP {} - {}", status, body)));
        }

        let body: RestResponse = response
            .json()
            .await
            .map_err(|e| Error::RemoteStore(format!("Invalid KV response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(Error::RemoteStore(error));
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteStore for KvRestStore {
    fn id(&self) -> &'static str {
        "KV_REST"
    }

    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>> {
        let url = format!("{}/get/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::RemoteStore(e.to_string()))?;

        let body = self.read_response(response).await?;
        let entry = body.result.and_then(decode_stored);
        debug!("KV get '{}': {}", key, if entry.is_some() { "hit" } else { "miss" });
        Ok(entry)
    }

    async fn set(&self, key: &str, entry: &RemoteEntry, ttl: Option<Duration>) -> Result<()> {
        let payload = serde_json::to_string(&Envelope {
            data: entry.value.clone(),
            written_at: entry.written_at,
        })?;

        let mut url = format!("{}/set/{}", self.base_url, key);
        if let Some(ttl) = ttl.filter(|t| t.num_seconds() > 0) {
            url.push_str(&format!("?EX={}", ttl.num_seconds()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::RemoteStore(e.to_string()))?;

        self.read_response(response).await?;
        Ok(())
    }
}

/// Decode a stored value. Strings holding JSON are unwrapped first; values
/// without an envelope are returned as-is with no write time.
fn decode_stored(raw: Value) -> Option<RemoteEntry> {
    let value = match raw {
        Value::Null => return None,
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    };

    let is_envelope = value
        .as_object()
        .is_some_and(|map| map.contains_key("data"));

    if is_envelope {
        if let Ok(envelope) = serde_json::from_value::<Envelope>(value.clone()) {
            return Some(RemoteEntry {
                value: envelope.data,
                written_at: envelope.written_at,
            });
        }
    }

    Some(RemoteEntry {
        value,
        written_at: None,
    })
}
