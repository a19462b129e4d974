//! Manager roster.

use async_trait::async_trait;
use log::error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::{Error, Result};

/// One tracked manager and the stock they picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub name: String,
    pub stock_symbol: String,
    #[serde(default, alias = "analysisText", skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// Source of the roster. Read-only.
#[async_trait]
pub trait ManagerSource: Send + Sync {
    async fn load_managers(&self) -> Result<Vec<Manager>>;
}

/// Roster stored as a JSON array, re-read on every call so edits show up
/// without a restart.
#[derive(Debug, Clone)]
pub struct JsonFileManagers {
    path: PathBuf,
}

impl JsonFileManagers {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManagerSource for JsonFileManagers {
    async fn load_managers(&self) -> Result<Vec<Manager>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!("Failed to read managers from {}: {}", self.path.display(), e);
            Error::ConfigIO(format!("{}: {}", self.path.display(), e))
        })?;

        let managers: Vec<Manager> = serde_json::from_str(&raw).map_err(|e| {
            error!("Failed to parse managers from {}: {}", self.path.display(), e);
            Error::ConfigIO(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(managers
            .into_iter()
            .map(|mut m| {
                m.stock_symbol = m.stock_symbol.trim().to_uppercase();
                m
            })
            .filter(|m| !m.stock_symbol.is_empty())
            .collect())
    }
}

/// Fixed roster, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticManagers(pub Vec<Manager>);

#[async_trait]
impl ManagerSource for StaticManagers {
    async fn load_managers(&self) -> Result<Vec<Manager>> {
        Ok(self.0.clone())
    }
}
