//! Credential store backed by fixed values.

use secrecy::{ExposeSecret, Secret};

use crate::config::CredentialsConfig;
use crate::domain::foundation::ObserverId;
use crate::domain::topic::ObserverIdentity;
use crate::ports::CredentialStore;

/// Credentials that never change for the lifetime of the process.
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    token: Option<Secret<String>>,
    observer: Option<ObserverIdentity>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Secret::new(token.into()));
        self
    }

    pub fn with_observer(mut self, id: ObserverId, display_name: impl Into<String>) -> Self {
        self.observer = Some(ObserverIdentity::new(id, display_name));
        self
    }

    /// Builds the store from the `credentials` section. Invalid ids are ignored.
    pub fn from_config(config: &CredentialsConfig) -> Self {
        let mut store = Self::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            store = store.with_token(token);
        }
        if let Some(id) = config.user_id.as_deref().and_then(|id| ObserverId::new(id).ok()) {
            let name = config.user_name.clone().unwrap_or_else(|| id.to_string());
            store = store.with_observer(id, name);
        }
        store
    }
}

impl CredentialStore for StaticCredentialStore {
    fn access_token(&self) -> Option<Secret<String>> {
        self.token
            .as_ref()
            .map(|t| Secret::new(t.expose_secret().clone()))
    }

    fn current_observer(&self) -> Option<ObserverIdentity> {
        self.observer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_reads_token_and_identity() {
        let store = StaticCredentialStore::from_config(&CredentialsConfig {
            token: Some("abc".into()),
            user_id: Some("u1".into()),
            user_name: Some("Ana".into()),
        });
        assert_eq!(store.access_token().unwrap().expose_secret(), "abc");
        let observer = store.current_observer().unwrap();
        assert_eq!(observer.id.as_str(), "u1");
        assert_eq!(observer.display_name, "Ana");
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let store = StaticCredentialStore::from_config(&CredentialsConfig {
            token: Some(String::new()),
            ..Default::default()
        });
        assert!(store.access_token().is_none());
        assert!(store.current_observer().is_none());
    }
}
