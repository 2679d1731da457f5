//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Endpoint URL must use ws:// or wss://")]
    InvalidEndpointUrl,

    #[error("Endpoint path must start with '/'")]
    InvalidEndpointPath,

    #[error("API base URL must use http:// or https://")]
    InvalidApiUrl,

    #[error("Invalid connect timeout")]
    InvalidTimeout,

    #[error("Reconnect base delay must be positive and not exceed the max delay")]
    InvalidBackoff,

    #[error("Reconnect attempts must be between 1 and 20")]
    InvalidAttemptCount,

    #[error("Presence intervals must be positive")]
    InvalidPresenceInterval,

    #[error("Presence record TTL must be at least the heartbeat interval")]
    PresenceTtlTooShort,

    #[error("Channel capacity must be positive")]
    InvalidChannelCapacity,
}
