//! User-facing advisory notices derived from pushes.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::notifier::Notifier;
use crate::domain::message::{InboundMessage, MessageBody, MessageKind};
use crate::domain::topic::Topic;
use crate::ports::{CredentialStore, HandlerError, MessageHandler, Notice, NoticeKind};

pub const ADVISORY_KINDS: [MessageKind; 5] = [
    MessageKind::IncidentCreated,
    MessageKind::AssigneeChanged,
    MessageKind::StateChanged,
    MessageKind::CommentAdded,
    MessageKind::AttachmentAdded,
];

/// Emits at most one notice per message.
///
/// Creation and reassignment are announced from the list broadcast; state,
/// comment and attachment changes from the resource feed. A push that
/// arrives on both topics therefore notifies once. Changes made by the local
/// observer are not announced back to them.
pub struct AdvisoryNotifier {
    notifier: Arc<Notifier>,
    credentials: Arc<dyn CredentialStore>,
}

impl AdvisoryNotifier {
    pub fn new(notifier: Arc<Notifier>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            notifier,
            credentials,
        }
    }

    fn from_local_observer(&self, message: &InboundMessage) -> bool {
        match (&message.sender, self.credentials.current_observer()) {
            (Some(sender), Some(local)) => *sender == local.id,
            _ => false,
        }
    }
}

fn title_of(incident: &Value) -> Option<&str> {
    incident.get("title").and_then(Value::as_str)
}

/// The notice `message` warrants on `topic`, if any.
pub fn advisory_for(topic: &Topic, message: &InboundMessage) -> Option<Notice> {
    let notice = match (topic, &message.body) {
        (Topic::ListBroadcast, MessageBody::IncidentCreated(p)) => {
            let text = match title_of(&p.incident) {
                Some(title) => format!("New incident #{}: {}", p.incident_id, title),
                None => format!("New incident #{}", p.incident_id),
            };
            Notice::transient(NoticeKind::ResourceCreated, text).about(p.incident_id.clone())
        }
        (Topic::ListBroadcast, MessageBody::AssigneeChanged(p)) => {
            let text = match &p.assignee_name {
                Some(name) => format!("Incident #{} reassigned to {}", p.incident_id, name),
                None => format!("Incident #{} was reassigned", p.incident_id),
            };
            Notice::transient(NoticeKind::Reassigned, text).about(p.incident_id.clone())
        }
        (Topic::ResourceFeed(_), MessageBody::StateChanged(p)) => {
            let text = match &p.from_state {
                Some(from) => format!("Incident #{} moved from {} to {}", p.incident_id, from, p.to_state),
                None => format!("Incident #{} moved to {}", p.incident_id, p.to_state),
            };
            Notice::transient(NoticeKind::StateTransition, text).about(p.incident_id.clone())
        }
        (Topic::ResourceFeed(_), MessageBody::CommentAdded(p)) => Notice::transient(
            NoticeKind::CommentAdded,
            format!("New comment on incident #{}", p.incident_id),
        )
        .about(p.incident_id.clone()),
        (Topic::ResourceFeed(_), MessageBody::AttachmentAdded(p)) => Notice::transient(
            NoticeKind::AttachmentAdded,
            format!("New attachment on incident #{}", p.incident_id),
        )
        .about(p.incident_id.clone()),
        _ => return None,
    };
    Some(notice)
}

#[async_trait]
impl MessageHandler for AdvisoryNotifier {
    async fn handle(&self, topic: &Topic, message: &InboundMessage) -> Result<(), HandlerError> {
        if self.from_local_observer(message) {
            return Ok(());
        }
        if let Some(notice) = advisory_for(topic, message) {
            self.notifier.notify(notice);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "AdvisoryNotifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{RecordingSurface, StaticCredentialStore};
    use crate::domain::foundation::{ObserverId, ResourceId};
    use crate::domain::message::decode_frame;
    use serde_json::json;

    fn message(frame: Value) -> InboundMessage {
        decode_frame(&frame.to_string()).unwrap().unwrap()
    }

    fn feed(id: &str) -> Topic {
        Topic::resource(ResourceId::new(id).unwrap())
    }

    fn setup() -> (AdvisoryNotifier, Arc<RecordingSurface>) {
        let notifier = Arc::new(Notifier::new());
        let surface = Arc::new(RecordingSurface::new());
        notifier.mount(surface.clone());
        let credentials = Arc::new(
            StaticCredentialStore::new().with_observer(ObserverId::new("me").unwrap(), "Me"),
        );
        (AdvisoryNotifier::new(notifier, credentials), surface)
    }

    fn state_changed(sender: &str) -> InboundMessage {
        message(json!({
            "type": "state_changed",
            "user_id": sender,
            "data": {"incident_id": "A", "from_state": "Open", "to_state": "Closed"}
        }))
    }

    #[tokio::test]
    async fn state_change_notifies_once_across_both_topics() {
        let (advisories, surface) = setup();
        let msg = state_changed("other");

        advisories.handle(&Topic::ListBroadcast, &msg).await.unwrap();
        advisories.handle(&feed("A"), &msg).await.unwrap();

        assert_eq!(surface.count_of(NoticeKind::StateTransition), 1);
        assert_eq!(
            surface.notices()[0].message,
            "Incident #A moved from Open to Closed"
        );
    }

    #[tokio::test]
    async fn own_changes_are_not_announced() {
        let (advisories, surface) = setup();
        advisories.handle(&feed("A"), &state_changed("me")).await.unwrap();
        assert!(surface.notices().is_empty());
    }

    #[tokio::test]
    async fn creation_is_announced_from_list_broadcast() {
        let (advisories, surface) = setup();
        let msg = message(json!({"type": "incident_created", "data": {"incident": {"id": "N", "title": "Disk full"}}}));

        advisories.handle(&Topic::ListBroadcast, &msg).await.unwrap();
        advisories.handle(&feed("N"), &msg).await.unwrap();

        let notices = surface.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::ResourceCreated);
        assert_eq!(notices[0].message, "New incident #N: Disk full");
    }

    #[test]
    fn presence_and_viewer_counts_are_silent() {
        let joined = message(json!({"type": "user_joined", "data": {"user_id": "u2"}}));
        let viewers = message(json!({"type": "viewer_count_update", "data": {"incident_id": "A", "active_viewers": 2}}));
        assert!(advisory_for(&feed("A"), &joined).is_none());
        assert!(advisory_for(&Topic::ListBroadcast, &viewers).is_none());
    }

    #[tokio::test]
    async fn unmounted_surface_does_not_fail() {
        let notifier = Arc::new(Notifier::new());
        let advisories = AdvisoryNotifier::new(notifier, Arc::new(StaticCredentialStore::new()));
        let result = advisories.handle(&feed("A"), &state_changed("other")).await;
        assert!(result.is_ok());
    }
}
