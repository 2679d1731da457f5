//! Presence backstop intervals

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Heartbeat, poll and TTL settings for presence tracking
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Seconds between presence re-marks
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Seconds between snapshot polls
    #[serde(default = "default_poll")]
    pub poll_secs: u64,

    /// Seconds after which an unrefreshed record is pruned
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,
}

/// Presence intervals as durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSettings {
    pub heartbeat: Duration,
    pub poll: Duration,
    pub record_ttl: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        PresenceConfig::default().settings()
    }
}

impl PresenceConfig {
    pub fn settings(&self) -> PresenceSettings {
        PresenceSettings {
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            poll: Duration::from_secs(self.poll_secs),
            record_ttl: Duration::from_secs(self.record_ttl_secs),
        }
    }

    /// Validate presence configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.heartbeat_secs == 0 || self.poll_secs == 0 || self.record_ttl_secs == 0 {
            return Err(ValidationError::InvalidPresenceInterval);
        }
        if self.record_ttl_secs < self.heartbeat_secs {
            return Err(ValidationError::PresenceTtlTooShort);
        }
        Ok(())
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat(),
            poll_secs: default_poll(),
            record_ttl_secs: default_record_ttl(),
        }
    }
}

fn default_heartbeat() -> u64 {
    180
}

fn default_poll() -> u64 {
    60
}

fn default_record_ttl() -> u64 {
    360
}
