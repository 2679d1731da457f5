//! MessageHandler port - Consumers of routed inbound messages.

use async_trait::async_trait;

use crate::domain::message::InboundMessage;
use crate::domain::topic::Topic;

/// A handler failure. Logged by the router; never affects the connection.
#[derive(Debug, thiserror::Error)]
#[error("{handler}: {reason}")]
pub struct HandlerError {
    pub handler: &'static str,
    pub reason: String,
}

impl HandlerError {
    pub fn new(handler: &'static str, reason: impl Into<String>) -> Self {
        Self {
            handler,
            reason: reason.into(),
        }
    }
}

/// Handler for messages arriving on a topic.
///
/// Implementations should be:
/// - **Idempotent** - the same push may arrive on the list and resource topics
/// - **Quick** - long work is spawned, not awaited
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl MessageHandler for ViewerBadge {
///     async fn handle(&self, topic: &Topic, message: &InboundMessage) -> Result<(), HandlerError> {
///         // update the badge...
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "ViewerBadge"
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, topic: &Topic, message: &InboundMessage) -> Result<(), HandlerError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Hooks run when a topic gains its first subscriber or loses its last.
#[async_trait]
pub trait TopicLifecycle: Send + Sync {
    async fn topic_activated(&self, topic: &Topic);

    async fn topic_released(&self, topic: &Topic);
}
