//! Unified error types for Starwatch.

use thiserror::Error;

/// Result type alias using StarwatchError.
pub type Result<T> = std::result::Result<T, StarwatchError>;

#[derive(Error, Debug)]
pub enum StarwatchError {
    // Snapshot source errors
    #[error("Snapshot source error: {0}")]
    Source(String),

    // Channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Recipient unreachable: {0}")]
    RecipientUnreachable(String),

    #[error("Publish error: {0}")]
    Publish(String),

    // Persistence errors
    #[error("Store error: {0}")]
    Store(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl StarwatchError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}
