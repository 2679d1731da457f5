//! Presence API over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{authorize, join};
use crate::domain::foundation::{ObserverId, ResourceId, Timestamp};
use crate::domain::presence::PresenceRecord;
use crate::domain::topic::ObserverIdentity;
use crate::ports::{CredentialStore, PresenceApi, PresenceError};

/// `POST/GET {api}/incidents/{id}/viewers`, `DELETE {api}/incidents/{id}/viewers/{user}`.
pub struct HttpPresenceApi {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

#[derive(Debug, Serialize)]
struct MarkBody<'a> {
    user_id: &'a str,
    user_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ViewerRow {
    user_id: ObserverId,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    last_seen: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ViewerList {
    Bare(Vec<ViewerRow>),
    Wrapped { viewers: Vec<ViewerRow> },
}

impl HttpPresenceApi {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            credentials,
        }
    }

    fn viewers_url(&self, resource: &ResourceId) -> String {
        join(&self.base_url, &format!("/incidents/{}/viewers", resource))
    }

    async fn check(response: Result<Response, reqwest::Error>) -> Result<Response, PresenceError> {
        let response = response.map_err(|e| PresenceError::Request(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(PresenceError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl PresenceApi for HttpPresenceApi {
    async fn mark(
        &self,
        resource: &ResourceId,
        observer: &ObserverIdentity,
    ) -> Result<(), PresenceError> {
        let request = self.client.post(self.viewers_url(resource)).json(&MarkBody {
            user_id: observer.id.as_str(),
            user_name: &observer.display_name,
        });
        Self::check(authorize(request, self.credentials.as_ref()).send().await).await?;
        Ok(())
    }

    async fn unmark(
        &self,
        resource: &ResourceId,
        observer: &ObserverIdentity,
    ) -> Result<(), PresenceError> {
        let url = format!("{}/{}", self.viewers_url(resource), observer.id);
        let request = self.client.delete(url);
        Self::check(authorize(request, self.credentials.as_ref()).send().await).await?;
        Ok(())
    }

    async fn list(&self, resource: &ResourceId) -> Result<Vec<PresenceRecord>, PresenceError> {
        let request = self.client.get(self.viewers_url(resource));
        let response = Self::check(authorize(request, self.credentials.as_ref()).send().await).await?;
        let list: ViewerList = response
            .json()
            .await
            .map_err(|e| PresenceError::Decode(e.to_string()))?;
        Ok(into_records(resource, list))
    }
}

fn into_records(resource: &ResourceId, list: ViewerList) -> Vec<PresenceRecord> {
    let rows = match list {
        ViewerList::Bare(rows) | ViewerList::Wrapped { viewers: rows } => rows,
    };
    let now = Timestamp::now();
    rows.into_iter()
        .map(|row| PresenceRecord {
            resource_id: resource.clone(),
            display_name: if row.user_name.is_empty() {
                row.user_id.to_string()
            } else {
                row.user_name
            },
            observer_id: row.user_id,
            last_seen: row
                .last_seen
                .as_deref()
                .and_then(Timestamp::parse_rfc3339)
                .unwrap_or(now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn viewer_list_accepts_bare_and_wrapped_shapes() {
        let resource = ResourceId::new("7").unwrap();
        let bare: ViewerList =
            serde_json::from_value(json!([{"user_id": 1, "user_name": "Ana"}])).unwrap();
        let wrapped: ViewerList = serde_json::from_value(json!({
            "viewers": [{"user_id": "1", "user_name": "Ana", "last_seen": "2025-01-01T00:00:00Z"}]
        }))
        .unwrap();

        let bare = into_records(&resource, bare);
        let wrapped = into_records(&resource, wrapped);
        assert_eq!(bare[0].observer_id, wrapped[0].observer_id);
        assert_eq!(wrapped[0].last_seen.to_string(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn nameless_rows_fall_back_to_id() {
        let list: ViewerList = serde_json::from_value(json!([{"user_id": "u9"}])).unwrap();
        let records = into_records(&ResourceId::new("7").unwrap(), list);
        assert_eq!(records[0].display_name, "u9");
    }
}
