//! Guards user mutations against changes made elsewhere.
//!
//! A mutation surface opens a ticket recording the state it assumes. Pushes
//! that move the resource away from that state cancel the ticket. A submit
//! the server rejects for a version conflict invalidates the resource's
//! projections so they refetch, and is never retried.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use super::notifier::Notifier;
use crate::domain::foundation::{MutationId, ResourceId};
use crate::domain::message::{InboundMessage, MessageKind};
use crate::domain::projection::{replace_detail, version_of};
use crate::domain::topic::Topic;
use crate::domain::version_guard::{assess, Assessment, ObservedState, PendingMutation};
use crate::ports::{
    HandlerError, MessageHandler, MutationError, MutationGateway, MutationRequest, Notice,
    NoticeKind, ProjectionKey, ProjectionStore,
};

/// Message kinds that can invalidate an open mutation.
pub const GUARDED_KINDS: [MessageKind; 3] = [
    MessageKind::StateChanged,
    MessageKind::IncidentUpdated,
    MessageKind::AssigneeChanged,
];

/// Errors from submitting through the guard.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("mutation {0} was cancelled because the resource changed elsewhere")]
    Cancelled(MutationId),

    /// The server rejected the submit's version. Projections were invalidated.
    #[error("resource changed elsewhere: submitted version {expected}, server has {actual:?}")]
    Stale { expected: i64, actual: Option<i64> },

    #[error(transparent)]
    Mutation(MutationError),
}

/// Handle held by an open mutation surface.
#[derive(Debug)]
pub struct MutationTicket {
    id: MutationId,
    resource_id: ResourceId,
    cancelled: watch::Receiver<bool>,
}

impl MutationTicket {
    pub fn id(&self) -> MutationId {
        self.id
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the ticket is cancelled or the guard forgets it.
    pub async fn cancelled(&mut self) {
        let _ = self.cancelled.wait_for(|c| *c).await;
    }
}

struct OpenMutation {
    pending: PendingMutation,
    cancel: watch::Sender<bool>,
}

pub struct VersionGuard {
    store: Arc<dyn ProjectionStore>,
    gateway: Arc<dyn MutationGateway>,
    notifier: Arc<Notifier>,
    open: Mutex<HashMap<MutationId, OpenMutation>>,
}

impl VersionGuard {
    pub fn new(
        store: Arc<dyn ProjectionStore>,
        gateway: Arc<dyn MutationGateway>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a mutation against `resource_id`, assuming it is in `from_state`
    /// at `version`.
    pub fn open(
        &self,
        resource_id: ResourceId,
        from_state: impl Into<String>,
        version: i64,
    ) -> MutationTicket {
        let pending = PendingMutation::new(resource_id.clone(), from_state, version);
        let id = pending.id;
        let (cancel, cancelled) = watch::channel(false);
        self.open_mutations()
            .insert(id, OpenMutation { pending, cancel });
        MutationTicket {
            id,
            resource_id,
            cancelled,
        }
    }

    /// Forgets a ticket whose surface closed without submitting.
    pub fn close(&self, ticket: MutationTicket) {
        self.open_mutations().remove(&ticket.id);
    }

    pub fn open_count(&self) -> usize {
        self.open_mutations().len()
    }

    /// Submits the transition carrying the cached version of the resource.
    pub async fn submit(
        &self,
        ticket: &MutationTicket,
        to_state: impl Into<String>,
        comment: Option<String>,
    ) -> Result<Value, GuardError> {
        let to_state = to_state.into();
        let key = ProjectionKey::Detail(ticket.resource_id.clone());

        let version = {
            let mut open = self.open_mutations();
            let entry = match open.get_mut(&ticket.id) {
                Some(entry) if !ticket.is_cancelled() => entry,
                _ => return Err(GuardError::Cancelled(ticket.id)),
            };
            entry.pending.in_flight = Some(to_state.clone());
            self.store
                .get(&key)
                .as_ref()
                .and_then(version_of)
                .unwrap_or(entry.pending.version)
        };

        let request = MutationRequest {
            resource_id: ticket.resource_id.clone(),
            to_state,
            version,
            comment,
        };

        match self.gateway.transition(&request).await {
            Ok(updated) => {
                if let Some(next) = replace_detail(self.store.get(&key).as_ref(), &updated) {
                    self.store.set(key, next);
                }
                self.open_mutations().remove(&ticket.id);
                Ok(updated)
            }
            Err(MutationError::VersionConflict { expected, actual }) => {
                tracing::info!(
                    resource = %ticket.resource_id,
                    expected,
                    actual = ?actual,
                    "Mutation rejected for version conflict, refetching"
                );
                self.refetch(&ticket.resource_id);
                self.forget(&ticket.id);
                self.notifier.notify(updated_elsewhere(&ticket.resource_id));
                Err(GuardError::Stale { expected, actual })
            }
            Err(e) => {
                if let Some(entry) = self.open_mutations().get_mut(&ticket.id) {
                    entry.pending.in_flight = None;
                }
                Err(GuardError::Mutation(e))
            }
        }
    }

    fn refetch(&self, resource_id: &ResourceId) {
        self.store.invalidate(&ProjectionKey::Detail(resource_id.clone()));
        for key in self.store.list_keys() {
            self.store.invalidate(&key);
        }
    }

    fn forget(&self, id: &MutationId) {
        if let Some(entry) = self.open_mutations().remove(id) {
            entry.cancel.send_replace(true);
        }
    }

    /// Cancels every ticket `observed` invalidates. Returns how many.
    fn cancel_stale(&self, observed: &ObservedState) -> usize {
        let mut open = self.open_mutations();
        let mut stale = Vec::new();
        for (id, entry) in open.iter_mut() {
            match assess(&entry.pending, observed) {
                Assessment::Stale => stale.push(*id),
                Assessment::StillValid | Assessment::OwnChange => {
                    if entry.pending.resource_id == observed.resource_id {
                        if let Some(version) = observed.version {
                            entry.pending.version = entry.pending.version.max(version);
                        }
                    }
                }
            }
        }
        for id in &stale {
            if let Some(entry) = open.remove(id) {
                entry.cancel.send_replace(true);
            }
        }
        stale.len()
    }

    fn open_mutations(&self) -> MutexGuard<'_, HashMap<MutationId, OpenMutation>> {
        self.open
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn updated_elsewhere(resource_id: &ResourceId) -> Notice {
    Notice::transient(
        NoticeKind::UpdatedElsewhere,
        format!(
            "Incident #{} was updated by another user. Showing the latest version",
            resource_id
        ),
    )
    .about(resource_id.clone())
}

#[async_trait]
impl MessageHandler for VersionGuard {
    async fn handle(&self, topic: &Topic, message: &InboundMessage) -> Result<(), HandlerError> {
        let Some(observed) = ObservedState::from_message(message) else {
            return Ok(());
        };
        let cancelled = self.cancel_stale(&observed);
        if cancelled > 0 {
            tracing::info!(
                topic = %topic,
                resource = %observed.resource_id,
                cancelled,
                "Cancelled mutations overtaken by a remote change"
            );
            self.notifier.notify(updated_elsewhere(&observed.resource_id));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "VersionGuard"
    }
}
