//! NotificationSurface port - Advisory toasts shown to the user.

use serde::Serialize;

use crate::domain::foundation::ResourceId;

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    ConnectionRetrying,
    ReconnectFailed,
    ConfigurationError,
    UpdatedElsewhere,
    ResourceCreated,
    Reassigned,
    StateTransition,
    CommentAdded,
    AttachmentAdded,
}

/// A user-visible, non-blocking notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub resource_id: Option<ResourceId>,
    /// Persistent notices stay until dismissed; the rest are transient.
    pub persistent: bool,
}

impl Notice {
    pub fn transient(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resource_id: None,
            persistent: false,
        }
    }

    pub fn persistent(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            persistent: true,
            ..Self::transient(kind, message)
        }
    }

    pub fn about(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }
}

/// A mounted UI surface able to show notices.
pub trait NotificationSurface: Send + Sync {
    fn show(&self, notice: &Notice);
}
