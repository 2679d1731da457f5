//! Topic URL construction.

use reqwest::Url;
use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::domain::topic::Topic;
use crate::ports::{CredentialStore, EndpointError, EndpointResolver};

/// Builds `base + path ? <topic pairs> & token=<credential>` for a topic.
///
/// Resolution happens on every connection attempt so a refreshed token is
/// picked up by the next reconnect.
pub struct EndpointBuilder {
    base_url: String,
    path: String,
    list_channel: String,
    credentials: Arc<dyn CredentialStore>,
}

impl EndpointBuilder {
    pub fn new(
        base_url: impl Into<String>,
        path: impl Into<String>,
        list_channel: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            list_channel: list_channel.into(),
            credentials,
        }
    }

    pub fn from_config(config: &EndpointConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::new(
            config.base_url.clone(),
            config.path.clone(),
            config.list_channel.clone(),
            credentials,
        )
    }

    pub fn url_for(&self, topic: &Topic) -> Result<Url, EndpointError> {
        if self.base_url.trim().is_empty() {
            return Err(EndpointError::MissingEndpoint);
        }
        let token = self
            .credentials
            .access_token()
            .ok_or(EndpointError::MissingCredential)?;

        let mut url =
            Url::parse(&self.base_url).map_err(|e| EndpointError::InvalidUrl(e.to_string()))?;
        let path = format!("{}{}", url.path().trim_end_matches('/'), self.path);
        url.set_path(&path);

        let observer = self.credentials.current_observer();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in topic.query_pairs(&self.list_channel, observer.as_ref()) {
                query.append_pair(key, &value);
            }
            query.append_pair("token", token.expose_secret());
        }
        Ok(url)
    }
}

impl EndpointResolver for EndpointBuilder {
    fn resolve(&self, topic: &Topic) -> Result<String, EndpointError> {
        self.url_for(topic).map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::StaticCredentialStore;
    use crate::domain::foundation::{ObserverId, ResourceId};

    fn builder(credentials: StaticCredentialStore) -> EndpointBuilder {
        EndpointBuilder::new("wss://rt.example.com", "/ws", "incidents", Arc::new(credentials))
    }

    fn signed_in() -> StaticCredentialStore {
        StaticCredentialStore::new()
            .with_token("t0k")
            .with_observer(ObserverId::new("u1").unwrap(), "Ana Lee")
    }

    #[test]
    fn list_url_carries_channel_and_token() {
        let url = builder(signed_in()).url_for(&Topic::ListBroadcast).unwrap();
        assert_eq!(url.as_str(), "wss://rt.example.com/ws?channel=incidents&token=t0k");
    }

    #[test]
    fn resource_url_carries_incident_and_identity() {
        let topic = Topic::resource(ResourceId::new("42").unwrap());
        let url = builder(signed_in()).url_for(&topic).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://rt.example.com/ws?incident_id=42&user_id=u1&user_name=Ana+Lee&token=t0k"
        );
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let result = builder(StaticCredentialStore::new()).url_for(&Topic::ListBroadcast);
        assert_eq!(result, Err(EndpointError::MissingCredential));
    }

    #[test]
    fn missing_base_url_is_a_configuration_error() {
        let builder = EndpointBuilder::new("", "/ws", "incidents", Arc::new(signed_in()));
        assert_eq!(
            builder.url_for(&Topic::ListBroadcast),
            Err(EndpointError::MissingEndpoint)
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let builder =
            EndpointBuilder::new("wss://rt.example.com/api/", "/ws", "incidents", Arc::new(signed_in()));
        let url = builder.url_for(&Topic::ListBroadcast).unwrap();
        assert!(url.as_str().starts_with("wss://rt.example.com/api/ws?"));
    }
}
