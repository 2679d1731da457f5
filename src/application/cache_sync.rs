//! Applies routed messages to cached projections.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::message::{InboundMessage, MessageKind};
use crate::domain::projection::{apply_list_patch, replace_detail, DetailAction, ListOutcome, ListPatch};
use crate::domain::topic::Topic;
use crate::ports::{HandlerError, MessageHandler, ProjectionKey, ProjectionStore};

/// Message kinds that can change a cached projection.
pub const PROJECTION_KINDS: [MessageKind; 7] = [
    MessageKind::ViewerCountUpdate,
    MessageKind::IncidentCreated,
    MessageKind::IncidentUpdated,
    MessageKind::AssigneeChanged,
    MessageKind::StateChanged,
    MessageKind::CommentAdded,
    MessageKind::AttachmentAdded,
];

/// Merges pushes into the projection store.
///
/// The same push may arrive on both the list and the resource topic, in
/// either order. Every step here is idempotent, so that is harmless.
pub struct CacheSynchronizer {
    store: Arc<dyn ProjectionStore>,
}

impl CacheSynchronizer {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self { store }
    }

    fn sync_lists(&self, topic: &Topic, patch: &ListPatch) {
        for key in self.store.list_keys() {
            let mut outcome = ListOutcome::NotFound;
            self.store
                .update(&key, &mut |list: &mut Value| outcome = apply_list_patch(list, patch));
            match outcome {
                ListOutcome::Invalidate => {
                    tracing::debug!(topic = %topic, key = %key, resource = %patch.id, "Invalidating list for new resource");
                    self.store.invalidate(&key);
                }
                ListOutcome::Stale => {
                    tracing::debug!(topic = %topic, key = %key, resource = %patch.id, "Skipped stale list patch");
                }
                ListOutcome::Patched(_) | ListOutcome::NotFound => {}
            }
        }
    }

    fn sync_detail(&self, topic: &Topic, action: DetailAction) {
        let key = ProjectionKey::Detail(action.resource_id().clone());
        match action {
            DetailAction::Replace { incident, .. } => {
                let mut kept_cached = false;
                self.store.update(&key, &mut |cached: &mut Value| {
                    match replace_detail(Some(&*cached), &incident) {
                        Some(next) => *cached = next,
                        None => kept_cached = true,
                    }
                });
                if kept_cached {
                    tracing::debug!(topic = %topic, key = %key, "Cached detail is newer than push");
                }
            }
            DetailAction::Invalidate { .. } => {
                if self.store.get(&key).is_some() {
                    self.store.invalidate(&key);
                }
            }
        }
    }
}

#[async_trait]
impl MessageHandler for CacheSynchronizer {
    async fn handle(&self, topic: &Topic, message: &InboundMessage) -> Result<(), HandlerError> {
        if let Some(patch) = ListPatch::from_message(message) {
            self.sync_lists(topic, &patch);
        }
        if let Some(action) = DetailAction::from_message(message) {
            self.sync_detail(topic, action);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CacheSynchronizer"
    }
}
