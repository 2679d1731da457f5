//! Presence API kept in memory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::lock;
use crate::domain::foundation::{ObserverId, ResourceId, Timestamp};
use crate::domain::presence::PresenceRecord;
use crate::domain::topic::ObserverIdentity;
use crate::ports::{PresenceApi, PresenceError};

/// A call made against the API, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceCall {
    Mark(ResourceId, ObserverId),
    Unmark(ResourceId, ObserverId),
    List(ResourceId),
}

#[derive(Debug, Default)]
pub struct InMemoryPresenceApi {
    records: Mutex<HashMap<ResourceId, HashMap<ObserverId, PresenceRecord>>>,
    calls: Mutex<Vec<PresenceCall>>,
    failing: AtomicBool,
}

impl InMemoryPresenceApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a viewer that some other client marked.
    pub fn with_viewer(self, resource: ResourceId, observer: ObserverId, name: &str) -> Self {
        self.insert(PresenceRecord {
            resource_id: resource,
            observer_id: observer,
            display_name: name.to_string(),
            last_seen: Timestamp::now(),
        });
        self
    }

    /// Stores `record` as the server would, replacing any earlier one.
    pub fn insert(&self, record: PresenceRecord) {
        lock(&self.records)
            .entry(record.resource_id.clone())
            .or_default()
            .insert(record.observer_id.clone(), record);
    }

    /// Makes every subsequent call fail.
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PresenceCall> {
        lock(&self.calls).clone()
    }

    pub fn mark_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, PresenceCall::Mark(..)))
            .count()
    }

    pub fn is_marked(&self, resource: &ResourceId, observer: &ObserverId) -> bool {
        lock(&self.records)
            .get(resource)
            .map_or(false, |viewers| viewers.contains_key(observer))
    }

    fn record(&self, call: PresenceCall) -> Result<(), PresenceError> {
        lock(&self.calls).push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PresenceError::Status(503));
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceApi for InMemoryPresenceApi {
    async fn mark(
        &self,
        resource: &ResourceId,
        observer: &ObserverIdentity,
    ) -> Result<(), PresenceError> {
        self.record(PresenceCall::Mark(resource.clone(), observer.id.clone()))?;
        let record = PresenceRecord {
            resource_id: resource.clone(),
            observer_id: observer.id.clone(),
            display_name: observer.display_name.clone(),
            last_seen: Timestamp::now(),
        };
        lock(&self.records)
            .entry(resource.clone())
            .or_default()
            .insert(observer.id.clone(), record);
        Ok(())
    }

    async fn unmark(
        &self,
        resource: &ResourceId,
        observer: &ObserverIdentity,
    ) -> Result<(), PresenceError> {
        self.record(PresenceCall::Unmark(resource.clone(), observer.id.clone()))?;
        if let Some(viewers) = lock(&self.records).get_mut(resource) {
            viewers.remove(&observer.id);
        }
        Ok(())
    }

    async fn list(&self, resource: &ResourceId) -> Result<Vec<PresenceRecord>, PresenceError> {
        self.record(PresenceCall::List(resource.clone()))?;
        Ok(lock(&self.records)
            .get(resource)
            .map(|viewers| viewers.values().cloned().collect())
            .unwrap_or_default())
    }
}
