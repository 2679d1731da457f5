//! Reconnection backoff configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::connection::ReconnectPolicy;

/// Capped exponential backoff settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }

    /// Validate reconnect configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_delay_ms == 0 || self.base_delay_ms > self.max_delay_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        if self.max_attempts == 0 || self.max_attempts > 20 {
            return Err(ValidationError::InvalidAttemptCount);
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy_defaults() {
        assert_eq!(ReconnectConfig::default().policy(), ReconnectPolicy::default());
    }

    #[test]
    fn test_base_above_max_rejected() {
        let config = ReconnectConfig {
            base_delay_ms: 5000,
            max_delay_ms: 1000,
            max_attempts: 5,
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = ReconnectConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidAttemptCount));
    }
}
