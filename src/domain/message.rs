//! Inbound wire frames for topic connections.
//!
//! Frames are UTF-8 JSON objects of shape
//! `{ "type": string, "data": object, "user_id"?: string|number, "timestamp"?: string }`.
//! Decoding happens in two steps: the envelope first, then a typed payload
//! chosen by `type`. Unknown types decode to `None` and are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::foundation::{ObserverId, ResourceId, Timestamp};

// ============================================
// Message Kinds
// ============================================

/// The `type` values this layer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ViewerCountUpdate,
    IncidentCreated,
    IncidentUpdated,
    AssigneeChanged,
    StateChanged,
    CommentAdded,
    AttachmentAdded,
    UserJoined,
    UserLeft,
}

impl MessageKind {
    pub const ALL: [MessageKind; 9] = [
        MessageKind::ViewerCountUpdate,
        MessageKind::IncidentCreated,
        MessageKind::IncidentUpdated,
        MessageKind::AssigneeChanged,
        MessageKind::StateChanged,
        MessageKind::CommentAdded,
        MessageKind::AttachmentAdded,
        MessageKind::UserJoined,
        MessageKind::UserLeft,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ViewerCountUpdate => "viewer_count_update",
            MessageKind::IncidentCreated => "incident_created",
            MessageKind::IncidentUpdated => "incident_updated",
            MessageKind::AssigneeChanged => "assignee_changed",
            MessageKind::StateChanged => "state_changed",
            MessageKind::CommentAdded => "comment_added",
            MessageKind::AttachmentAdded => "attachment_added",
            MessageKind::UserJoined => "user_joined",
            MessageKind::UserLeft => "user_left",
        }
    }

    /// Maps a wire `type` string to a kind; unrecognized strings yield `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Payloads
// ============================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewerCount {
    pub incident_id: ResourceId,
    pub active_viewers: u64,
}

/// A full resource payload pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub incident_id: ResourceId,
    pub incident: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssigneeChange {
    pub incident_id: ResourceId,
    #[serde(default)]
    pub assignee_id: Option<Value>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub incident: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateChange {
    pub incident_id: ResourceId,
    #[serde(default)]
    pub from_state: Option<String>,
    pub to_state: String,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub incident: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommentNotice {
    pub incident_id: ResourceId,
    #[serde(default)]
    pub comment: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttachmentNotice {
    pub incident_id: ResourceId,
    #[serde(default)]
    pub attachment: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresenceChange {
    pub user_id: ObserverId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub incident_id: Option<ResourceId>,
}

/// Typed body of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    ViewerCountUpdate(ViewerCount),
    IncidentCreated(ResourceSnapshot),
    IncidentUpdated(ResourceSnapshot),
    AssigneeChanged(AssigneeChange),
    StateChanged(StateChange),
    CommentAdded(CommentNotice),
    AttachmentAdded(AttachmentNotice),
    UserJoined(PresenceChange),
    UserLeft(PresenceChange),
}

/// A decoded push message. Transient: consumed once, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub body: MessageBody,
    /// Observer whose action caused the push, when the server says so.
    pub sender: Option<ObserverId>,
    pub sent_at: Option<Timestamp>,
}

impl InboundMessage {
    pub fn new(body: MessageBody) -> Self {
        Self {
            body,
            sender: None,
            sent_at: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match &self.body {
            MessageBody::ViewerCountUpdate(_) => MessageKind::ViewerCountUpdate,
            MessageBody::IncidentCreated(_) => MessageKind::IncidentCreated,
            MessageBody::IncidentUpdated(_) => MessageKind::IncidentUpdated,
            MessageBody::AssigneeChanged(_) => MessageKind::AssigneeChanged,
            MessageBody::StateChanged(_) => MessageKind::StateChanged,
            MessageBody::CommentAdded(_) => MessageKind::CommentAdded,
            MessageBody::AttachmentAdded(_) => MessageKind::AttachmentAdded,
            MessageBody::UserJoined(_) => MessageKind::UserJoined,
            MessageBody::UserLeft(_) => MessageKind::UserLeft,
        }
    }

    /// The resource the message is about, if it names one.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match &self.body {
            MessageBody::ViewerCountUpdate(p) => Some(&p.incident_id),
            MessageBody::IncidentCreated(p) | MessageBody::IncidentUpdated(p) => {
                Some(&p.incident_id)
            }
            MessageBody::AssigneeChanged(p) => Some(&p.incident_id),
            MessageBody::StateChanged(p) => Some(&p.incident_id),
            MessageBody::CommentAdded(p) => Some(&p.incident_id),
            MessageBody::AttachmentAdded(p) => Some(&p.incident_id),
            MessageBody::UserJoined(p) | MessageBody::UserLeft(p) => p.incident_id.as_ref(),
        }
    }
}

// ============================================
// Decoding
// ============================================

/// A frame that could not be decoded.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a JSON envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("invalid '{kind}' payload: {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{0}' payload does not identify a resource")]
    MissingResource(MessageKind),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Decodes one text frame.
///
/// Returns `Ok(None)` for a well-formed frame of a type this layer does not consume.
pub fn decode_frame(text: &str) -> Result<Option<InboundMessage>, FrameError> {
    let raw: RawFrame = serde_json::from_str(text).map_err(FrameError::Envelope)?;
    let Some(kind) = MessageKind::from_wire(&raw.kind) else {
        return Ok(None);
    };

    let body = match kind {
        MessageKind::ViewerCountUpdate => MessageBody::ViewerCountUpdate(payload(kind, raw.data)?),
        MessageKind::IncidentCreated => MessageBody::IncidentCreated(snapshot(kind, raw.data)?),
        MessageKind::IncidentUpdated => MessageBody::IncidentUpdated(snapshot(kind, raw.data)?),
        MessageKind::AssigneeChanged => MessageBody::AssigneeChanged(payload(kind, raw.data)?),
        MessageKind::StateChanged => MessageBody::StateChanged(payload(kind, raw.data)?),
        MessageKind::CommentAdded => MessageBody::CommentAdded(payload(kind, raw.data)?),
        MessageKind::AttachmentAdded => MessageBody::AttachmentAdded(payload(kind, raw.data)?),
        MessageKind::UserJoined => MessageBody::UserJoined(payload(kind, raw.data)?),
        MessageKind::UserLeft => MessageBody::UserLeft(payload(kind, raw.data)?),
    };

    Ok(Some(InboundMessage {
        body,
        sender: raw.user_id.and_then(|v| ObserverId::try_from(v).ok()),
        sent_at: raw
            .timestamp
            .as_deref()
            .and_then(Timestamp::parse_rfc3339),
    }))
}

fn payload<T: DeserializeOwned>(kind: MessageKind, data: Value) -> Result<T, FrameError> {
    serde_json::from_value(data).map_err(|source| FrameError::Payload { kind, source })
}

// Accepts either `{ "incident": {...} }` or the resource object itself as `data`.
fn snapshot(kind: MessageKind, data: Value) -> Result<ResourceSnapshot, FrameError> {
    let fallback_id = data.get("incident_id").cloned();
    let incident = match data {
        Value::Object(mut map) if map.contains_key("incident") => {
            map.remove("incident").unwrap_or(Value::Null)
        }
        other => other,
    };
    if !incident.is_object() {
        return Err(FrameError::MissingResource(kind));
    }
    let incident_id = incident
        .get("id")
        .cloned()
        .or(fallback_id)
        .and_then(|v| ResourceId::try_from(v).ok())
        .ok_or(FrameError::MissingResource(kind))?;
    Ok(ResourceSnapshot {
        incident_id,
        incident,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rid(s: &str) -> ResourceId {
        ResourceId::new(s).unwrap()
    }

    #[test]
    fn decodes_viewer_count_update() {
        let msg = decode_frame(
            r#"{"type":"viewer_count_update","data":{"incident_id":"A","active_viewers":3}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(msg.kind(), MessageKind::ViewerCountUpdate);
        assert_eq!(msg.resource_id(), Some(&rid("A")));
        assert_eq!(
            msg.body,
            MessageBody::ViewerCountUpdate(ViewerCount {
                incident_id: rid("A"),
                active_viewers: 3
            })
        );
    }

    #[test]
    fn decodes_state_change_with_envelope_fields() {
        let msg = decode_frame(
            r#"{"type":"state_changed","user_id":17,"timestamp":"2025-03-01T10:00:00Z",
                "data":{"incident_id":5,"from_state":"Open","to_state":"Closed","version":4}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(msg.sender, Some(ObserverId::new("17").unwrap()));
        assert!(msg.sent_at.is_some());
        match msg.body {
            MessageBody::StateChanged(change) => {
                assert_eq!(change.incident_id, rid("5"));
                assert_eq!(change.from_state.as_deref(), Some("Open"));
                assert_eq!(change.to_state, "Closed");
                assert_eq!(change.version, Some(4));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn incident_created_accepts_wrapped_and_bare_payloads() {
        let wrapped = decode_frame(
            r#"{"type":"incident_created","data":{"incident":{"id":"N","title":"x"}}}"#,
        )
        .unwrap()
        .unwrap();
        let bare = decode_frame(r#"{"type":"incident_created","data":{"id":"N","title":"x"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(wrapped.body, bare.body);
        assert_eq!(wrapped.resource_id(), Some(&rid("N")));
    }

    #[test]
    fn unknown_type_is_ignored() {
        let decoded = decode_frame(r#"{"type":"typing_started","data":{}}"#).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn malformed_json_is_an_envelope_error() {
        assert!(matches!(
            decode_frame("{not json"),
            Err(FrameError::Envelope(_))
        ));
    }

    #[test]
    fn missing_required_payload_field_is_a_payload_error() {
        let result = decode_frame(r#"{"type":"state_changed","data":{"incident_id":"A"}}"#);
        assert!(matches!(
            result,
            Err(FrameError::Payload {
                kind: MessageKind::StateChanged,
                ..
            })
        ));
    }

    #[test]
    fn snapshot_without_id_is_rejected() {
        let result = decode_frame(r#"{"type":"incident_updated","data":{"title":"no id"}}"#);
        assert!(matches!(result, Err(FrameError::MissingResource(_))));
    }

    #[test]
    fn presence_change_without_incident_has_no_resource() {
        let msg = decode_frame(r#"{"type":"user_joined","data":{"user_id":"u2","user_name":"Bo"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind(), MessageKind::UserJoined);
        assert!(msg.resource_id().is_none());
    }

    #[test]
    fn kinds_round_trip_through_wire_names() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_wire(kind.as_str()), Some(kind));
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }
}
