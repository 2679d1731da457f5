//! Real-time endpoint configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Where topic connections go
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the real-time server (ws:// or wss://)
    pub base_url: String,

    /// Upgrade path appended to the base URL
    #[serde(default = "default_path")]
    pub path: String,

    /// Channel discriminator sent by list-scope connections
    #[serde(default = "default_list_channel")]
    pub list_channel: String,

    /// Base URL of the REST API used by the presence and mutation adapters
    pub api_base_url: Option<String>,

    /// Seconds to wait for a connection to acknowledge open
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl EndpointConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate endpoint configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingRequired("endpoint.base_url"));
        }
        if !self.base_url.starts_with("ws://") && !self.base_url.starts_with("wss://") {
            return Err(ValidationError::InvalidEndpointUrl);
        }
        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidEndpointPath);
        }
        if let Some(api) = &self.api_base_url {
            if !api.starts_with("http://") && !api.starts_with("https://") {
                return Err(ValidationError::InvalidApiUrl);
            }
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_list_channel() -> String {
    "incidents".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> EndpointConfig {
        EndpointConfig {
            base_url: "wss://rt.example.com".to_string(),
            path: default_path(),
            list_channel: default_list_channel(),
            api_base_url: Some("https://api.example.com".to_string()),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    #[test]
    fn test_valid_endpoint() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_http_base_url_rejected() {
        let mut config = valid();
        config.base_url = "https://rt.example.com".to_string();
        assert_eq!(config.validate(), Err(ValidationError::InvalidEndpointUrl));
    }

    #[test]
    fn test_empty_base_url_is_missing() {
        let mut config = valid();
        config.base_url = " ".to_string();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("endpoint.base_url"))
        );
    }

    #[test]
    fn test_relative_path_rejected() {
        let mut config = valid();
        config.path = "ws".to_string();
        assert_eq!(config.validate(), Err(ValidationError::InvalidEndpointPath));
    }

    #[test]
    fn test_api_url_scheme_checked() {
        let mut config = valid();
        config.api_base_url = Some("ftp://api".to_string());
        assert_eq!(config.validate(), Err(ValidationError::InvalidApiUrl));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = valid();
        config.connect_timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }
}
