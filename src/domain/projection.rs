//! Structural merge rules for cached projections.
//!
//! List projections are either a bare JSON array of summaries or an envelope
//! object carrying them under `items` (next to pagination metadata). Element
//! identity is the `id` field. A patch touches only the matching element and
//! only the fields it carries; siblings and the envelope stay untouched.

use serde_json::{Map, Value};

use super::foundation::ResourceId;
use super::message::{InboundMessage, MessageBody};

/// Field holding the optimistic-concurrency counter of a resource.
pub const VERSION_FIELD: &str = "version";

/// Reads the version counter of a resource payload.
pub fn version_of(value: &Value) -> Option<i64> {
    value.get(VERSION_FIELD).and_then(Value::as_i64)
}

fn id_matches(element: &Value, id: &ResourceId) -> bool {
    match element.get("id") {
        Some(Value::String(s)) => s == id.as_str(),
        Some(Value::Number(n)) => n.to_string() == id.as_str(),
        _ => false,
    }
}

// ============================================
// List projections
// ============================================

/// Fields to overlay onto one list element.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPatch {
    pub id: ResourceId,
    pub fields: Map<String, Value>,
    /// Version the pushed fields were read at, if known.
    pub version: Option<i64>,
    /// The resource is new; absence from a list means the list is out of date.
    pub creation: bool,
}

impl ListPatch {
    /// Derives the list patch a message implies, if any.
    pub fn from_message(message: &InboundMessage) -> Option<ListPatch> {
        match &message.body {
            MessageBody::ViewerCountUpdate(p) => {
                let mut fields = Map::new();
                fields.insert("viewers".into(), Value::from(p.active_viewers));
                Some(ListPatch {
                    id: p.incident_id.clone(),
                    fields,
                    version: None,
                    creation: false,
                })
            }
            MessageBody::IncidentCreated(p) => {
                Self::full(p.incident_id.clone(), &p.incident, true)
            }
            MessageBody::IncidentUpdated(p) => {
                Self::full(p.incident_id.clone(), &p.incident, false)
            }
            MessageBody::AssigneeChanged(p) => {
                if let Some(incident) = &p.incident {
                    return Self::full(p.incident_id.clone(), incident, false);
                }
                let mut fields = Map::new();
                if let Some(assignee_id) = &p.assignee_id {
                    fields.insert("assignee_id".into(), assignee_id.clone());
                }
                if let Some(name) = &p.assignee_name {
                    fields.insert("assignee_name".into(), Value::from(name.clone()));
                }
                Self::partial(p.incident_id.clone(), fields, p.version)
            }
            MessageBody::StateChanged(p) => {
                if let Some(incident) = &p.incident {
                    return Self::full(p.incident_id.clone(), incident, false);
                }
                let mut fields = Map::new();
                fields.insert("state".into(), Value::from(p.to_state.clone()));
                Self::partial(p.incident_id.clone(), fields, p.version)
            }
            MessageBody::CommentAdded(_)
            | MessageBody::AttachmentAdded(_)
            | MessageBody::UserJoined(_)
            | MessageBody::UserLeft(_) => None,
        }
    }

    fn full(id: ResourceId, incident: &Value, creation: bool) -> Option<ListPatch> {
        let fields = incident.as_object()?.clone();
        let version = version_of(incident);
        Some(ListPatch {
            id,
            fields,
            version,
            creation,
        })
    }

    fn partial(
        id: ResourceId,
        mut fields: Map<String, Value>,
        version: Option<i64>,
    ) -> Option<ListPatch> {
        if let Some(v) = version {
            fields.insert(VERSION_FIELD.into(), Value::from(v));
        }
        if fields.is_empty() {
            return None;
        }
        Some(ListPatch {
            id,
            fields,
            version,
            creation: false,
        })
    }
}

/// What applying a patch to one list projection did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    /// This many matching elements were updated in place.
    Patched(usize),
    /// Matching elements already hold a newer version.
    Stale,
    /// No element matched; nothing changed.
    NotFound,
    /// No element matched a creation; the list must be refetched.
    Invalidate,
}

fn list_items_mut(list: &mut Value) -> Option<&mut Vec<Value>> {
    match list {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get_mut("items").and_then(Value::as_array_mut),
        _ => None,
    }
}

/// Overlays `patch` onto the matching elements of `list`.
pub fn apply_list_patch(list: &mut Value, patch: &ListPatch) -> ListOutcome {
    let Some(items) = list_items_mut(list) else {
        return ListOutcome::NotFound;
    };

    let mut matched = 0;
    let mut patched = 0;
    for element in items.iter_mut().filter(|e| id_matches(e, &patch.id)) {
        matched += 1;
        if let (Some(incoming), Some(cached)) = (patch.version, version_of(element)) {
            if incoming < cached {
                continue;
            }
        }
        if let Value::Object(fields) = element {
            for (key, value) in &patch.fields {
                fields.insert(key.clone(), value.clone());
            }
            patched += 1;
        }
    }

    match (matched, patched) {
        (0, _) if patch.creation => ListOutcome::Invalidate,
        (0, _) => ListOutcome::NotFound,
        (_, 0) => ListOutcome::Stale,
        (_, n) => ListOutcome::Patched(n),
    }
}

// ============================================
// Detail projections
// ============================================

/// What a message implies for the detail projection of one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailAction {
    /// The server pushed the full resource; it replaces the cached detail.
    Replace { id: ResourceId, incident: Value },
    /// Something changed that the push does not fully describe.
    Invalidate { id: ResourceId },
}

impl DetailAction {
    pub fn from_message(message: &InboundMessage) -> Option<DetailAction> {
        let replace = |id: &ResourceId, incident: &Value| DetailAction::Replace {
            id: id.clone(),
            incident: incident.clone(),
        };
        let invalidate = |id: &ResourceId| DetailAction::Invalidate { id: id.clone() };

        match &message.body {
            MessageBody::IncidentCreated(p) | MessageBody::IncidentUpdated(p) => {
                Some(replace(&p.incident_id, &p.incident))
            }
            MessageBody::StateChanged(p) => Some(match &p.incident {
                Some(incident) => replace(&p.incident_id, incident),
                None => invalidate(&p.incident_id),
            }),
            MessageBody::AssigneeChanged(p) => Some(match &p.incident {
                Some(incident) => replace(&p.incident_id, incident),
                None => invalidate(&p.incident_id),
            }),
            MessageBody::CommentAdded(p) => Some(invalidate(&p.incident_id)),
            MessageBody::AttachmentAdded(p) => Some(invalidate(&p.incident_id)),
            MessageBody::ViewerCountUpdate(_)
            | MessageBody::UserJoined(_)
            | MessageBody::UserLeft(_) => None,
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            DetailAction::Replace { id, .. } | DetailAction::Invalidate { id } => id,
        }
    }
}

/// Returns the detail to store, or `None` when the cached copy is newer.
pub fn replace_detail(cached: Option<&Value>, incoming: &Value) -> Option<Value> {
    match (cached.and_then(version_of), version_of(incoming)) {
        (Some(cached), Some(incoming_version)) if incoming_version < cached => None,
        _ => Some(incoming.clone()),
    }
}
