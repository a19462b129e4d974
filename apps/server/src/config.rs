use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use chrono::NaiveDate;

/// Connection details for the shared Redis-over-REST store.
#[derive(Debug, Clone)]
pub struct KvRestConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub managers_path: PathBuf,
    pub static_dir: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub upstream_timeout: Duration,
    pub kv_rest: Option<KvRestConfig>,
    pub kv_writes: bool,
    pub baseline_file: PathBuf,
    pub holidays_file: Option<PathBuf>,
    pub anchor_date: Option<NaiveDate>,
    pub cron_secret: Option<String>,
    pub refresh_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            managers_path: PathBuf::from("./managers.json"),
            static_dir: "public".to_string(),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(30_000),
            upstream_timeout: Duration::from_millis(8_000),
            kv_rest: None,
            kv_writes: false,
            baseline_file: PathBuf::from("./data/baselines.json"),
            holidays_file: None,
            anchor_date: None,
            cron_secret: None,
            refresh_interval: Duration::from_secs(900),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn millis(name: &str, default: Duration) -> Duration {
    var(name)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match var("LB_LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid LB_LISTEN_ADDR '{}'", raw))?,
            None => defaults.listen_addr,
        };
        let cors_allow = var("LB_CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_allow);
        let kv_rest = match (var("LB_KV_REST_URL"), var("LB_KV_REST_TOKEN")) {
            (Some(url), Some(token)) => Some(KvRestConfig { url, token }),
            _ => None,
        };
        let kv_writes = var("LB_KV_WRITES")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.kv_writes);
        let anchor_date = match var("LB_ANCHOR_DATE") {
            Some(raw) => Some(
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("Invalid LB_ANCHOR_DATE '{}'", raw))?,
            ),
            None => None,
        };
        let refresh_interval = var("LB_REFRESH_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_interval);

        Ok(Self {
            listen_addr,
            managers_path: var("LB_MANAGERS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.managers_path),
            static_dir: var("LB_STATIC_DIR").unwrap_or(defaults.static_dir),
            cors_allow,
            request_timeout: millis("LB_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            upstream_timeout: millis("LB_UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout),
            kv_rest,
            kv_writes,
            baseline_file: var("LB_BASELINE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.baseline_file),
            holidays_file: var("LB_HOLIDAYS_FILE").map(PathBuf::from),
            anchor_date,
            cron_secret: var("LB_CRON_SECRET"),
            refresh_interval,
        })
    }
}
