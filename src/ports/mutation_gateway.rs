//! MutationGateway port - Submits user-initiated resource mutations.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::foundation::ResourceId;

/// A workflow transition issued against a cached version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRequest {
    #[serde(skip)]
    pub resource_id: ResourceId,
    pub to_state: String,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Errors from submitting a mutation.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// The server holds a different version than the request carried.
    #[error("Version conflict: expected {expected}, found {actual:?}")]
    VersionConflict { expected: i64, actual: Option<i64> },

    #[error("mutation rejected: {0}")]
    Rejected(String),

    #[error("mutation request failed: {0}")]
    Request(String),
}

/// Port for the resource mutation endpoint.
#[async_trait]
pub trait MutationGateway: Send + Sync {
    /// Applies the transition and returns the updated resource.
    async fn transition(&self, request: &MutationRequest) -> Result<Value, MutationError>;
}
