//! Workflow transitions over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{authorize, join};
use crate::ports::{CredentialStore, MutationError, MutationGateway, MutationRequest};

/// `POST {api}/incidents/{id}/transition` with `{to_state, version, comment?}`.
///
/// `409 Conflict` is the server's optimistic-concurrency rejection.
pub struct HttpMutationGateway {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

#[derive(Debug, Default, Deserialize)]
struct ConflictBody {
    #[serde(default, alias = "actual_version")]
    current_version: Option<i64>,
}

impl HttpMutationGateway {
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
}

#[async_trait]
impl MutationGateway for HttpMutationGateway {
    async fn transition(&self, request: &MutationRequest) -> Result<Value, MutationError> {
        let url = join(
            &self.base_url,
            &format!("/incidents/{}/transition", request.resource_id),
        );
        let response = authorize(self.client.post(url).json(request), self.credentials.as_ref())
            .send()
            .await
            .map_err(|e| MutationError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| MutationError::Request(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body, request.version))
    }
}

fn classify_failure(status: StatusCode, body: &str, sent_version: i64) -> MutationError {
    if status == StatusCode::CONFLICT {
        let conflict: ConflictBody = serde_json::from_str(body).unwrap_or_default();
        return MutationError::VersionConflict {
            expected: sent_version,
            actual: conflict.current_version,
        };
    }
    MutationError::Rejected(format!("status {}: {}", status.as_u16(), body))
}
