//! Mutation gateway answering from a script.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::lock;
use crate::ports::{MutationError, MutationGateway, MutationRequest};

/// Pops one scripted result per call. With an empty script every transition
/// succeeds and bumps the version.
#[derive(Debug, Default)]
pub struct ScriptedMutationGateway {
    script: Mutex<VecDeque<Result<Value, MutationError>>>,
    requests: Mutex<Vec<MutationRequest>>,
}

impl ScriptedMutationGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_respond(self, result: Result<Value, MutationError>) -> Self {
        lock(&self.script).push_back(result);
        self
    }

    pub fn requests(&self) -> Vec<MutationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl MutationGateway for ScriptedMutationGateway {
    async fn transition(&self, request: &MutationRequest) -> Result<Value, MutationError> {
        lock(&self.requests).push(request.clone());
        let scripted = lock(&self.script).pop_front();
        scripted.unwrap_or_else(|| {
            Ok(json!({
                "id": request.resource_id.as_str(),
                "state": request.to_state,
                "version": request.version + 1,
            }))
        })
    }
}
