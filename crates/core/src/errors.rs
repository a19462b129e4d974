//! Core error types for the leaderboard.
//!
//! Provider failures arrive as [`MarketDataError`] and are wrapped here.
//! Remote-store and file failures are carried as strings so this type does
//! not depend on any particular transport.

use thiserror::Error;

pub use leaderboard_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the leaderboard core.
#[derive(Error, Debug)]
pub enum Error {
    /// A refresh failed and no tier holds a value for the key.
    #[error("No cached data available for '{0}'")]
    NoCacheAvailable(String),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote store error: {0}")]
    RemoteStore(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// True for the only failure the dashboard surfaces to users as
    /// "temporarily unavailable".
    pub fn is_no_cache(&self) -> bool {
        matches!(self, Error::NoCacheAvailable(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConfigIO(err.to_string())
    }
}
