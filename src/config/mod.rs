//! Configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `LIVE_SYNC` prefix and
//! nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use live_sync::config::SyncConfig;
//!
//! let config = SyncConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Connecting to {}", config.endpoint.base_url);
//! ```

mod credentials;
mod endpoint;
mod error;
mod logging;
mod presence;
mod reconnect;

pub use credentials::CredentialsConfig;
pub use endpoint::EndpointConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::{LogFormat, LoggingConfig};
pub use presence::{PresenceConfig, PresenceSettings};
pub use reconnect::ReconnectConfig;

use serde::Deserialize;

/// Root configuration of the synchronization layer
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Real-time endpoint (base URL, path, list channel)
    pub endpoint: EndpointConfig,

    /// Reconnection backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Presence heartbeat, poll and TTL
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Per-topic observer broadcast capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present
    /// 2. Reads environment variables with `LIVE_SYNC` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `LIVE_SYNC__ENDPOINT__BASE_URL=wss://...` -> `endpoint.base_url`
    /// - `LIVE_SYNC__RECONNECT__MAX_ATTEMPTS=5` -> `reconnect.max_attempts`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or unparseable.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LIVE_SYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.endpoint.validate()?;
        self.reconnect.validate()?;
        self.presence.validate()?;
        if self.channel_capacity == 0 {
            return Err(ValidationError::InvalidChannelCapacity);
        }
        Ok(())
    }
}

fn default_channel_capacity() -> usize {
    128
}
