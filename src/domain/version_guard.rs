//! Staleness rules for mutations issued against a cached resource version.

use serde_json::Value;

use super::foundation::{MutationId, ResourceId};
use super::message::{InboundMessage, MessageBody};
use super::projection::version_of;

/// A mutation surface open against a resource, with what it assumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub resource_id: ResourceId,
    /// State the mutation expects the resource to be in.
    pub from_state: String,
    /// Version of the resource when the surface was opened.
    pub version: i64,
    /// Target state of a submit currently in flight from this instance.
    pub in_flight: Option<String>,
}

impl PendingMutation {
    pub fn new(resource_id: ResourceId, from_state: impl Into<String>, version: i64) -> Self {
        Self {
            id: MutationId::new(),
            resource_id,
            from_state: from_state.into(),
            version,
            in_flight: None,
        }
    }
}

/// Authoritative state/version a push reports for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub resource_id: ResourceId,
    pub state: Option<String>,
    pub version: Option<i64>,
}

impl ObservedState {
    /// Extracts the state identity a message reports, if it reports one.
    pub fn from_message(message: &InboundMessage) -> Option<ObservedState> {
        match &message.body {
            MessageBody::StateChanged(p) => Some(ObservedState {
                resource_id: p.incident_id.clone(),
                state: Some(p.to_state.clone()),
                version: p.version.or_else(|| p.incident.as_ref().and_then(version_of)),
            }),
            MessageBody::IncidentUpdated(p) => Some(Self::from_snapshot(&p.incident_id, &p.incident)),
            MessageBody::AssigneeChanged(p) => p
                .incident
                .as_ref()
                .map(|incident| Self::from_snapshot(&p.incident_id, incident))
                .or_else(|| {
                    p.version.map(|v| ObservedState {
                        resource_id: p.incident_id.clone(),
                        state: None,
                        version: Some(v),
                    })
                }),
            _ => None,
        }
    }

    fn from_snapshot(id: &ResourceId, incident: &Value) -> ObservedState {
        ObservedState {
            resource_id: id.clone(),
            state: incident
                .get("state")
                .and_then(Value::as_str)
                .map(str::to_string),
            version: version_of(incident),
        }
    }
}

/// Verdict on a pending mutation after a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// The mutation's assumptions still hold.
    StillValid,
    /// The push reflects this instance's own in-flight submit.
    OwnChange,
    /// The resource moved away from the state the mutation assumes.
    Stale,
}

/// Decides whether `observed` invalidates `pending`.
pub fn assess(pending: &PendingMutation, observed: &ObservedState) -> Assessment {
    if pending.resource_id != observed.resource_id {
        return Assessment::StillValid;
    }
    match &observed.state {
        Some(state) if pending.in_flight.as_deref() == Some(state.as_str()) => {
            Assessment::OwnChange
        }
        Some(state) if *state != pending.from_state => Assessment::Stale,
        _ => Assessment::StillValid,
    }
}
