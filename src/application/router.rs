//! Dispatch of decoded messages to handlers by kind.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::message::{InboundMessage, MessageKind};
use crate::domain::topic::Topic;
use crate::ports::MessageHandler;

/// Kind-keyed handler table shared by every topic worker.
///
/// Handlers run in registration order. A failing handler is logged and does
/// not stop the others.
#[derive(Default)]
pub struct MessageRouter {
    handlers: RwLock<HashMap<MessageKind, Vec<Arc<dyn MessageHandler>>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for each of `kinds`.
    pub fn register(&self, kinds: &[MessageKind], handler: Arc<dyn MessageHandler>) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for kind in kinds {
            handlers.entry(*kind).or_default().push(Arc::clone(&handler));
        }
    }

    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Runs every handler registered for the message's kind. Returns how many ran.
    pub async fn dispatch(&self, topic: &Topic, message: &InboundMessage) -> usize {
        // Clone out so no lock is held across handler awaits
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&message.kind())
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            if let Err(e) = handler.handle(topic, message).await {
                tracing::warn!(
                    topic = %topic,
                    kind = %message.kind(),
                    handler = handler.name(),
                    error = %e,
                    "Message handler failed"
                );
            }
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::decode_frame;
    use crate::ports::HandlerError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl MessageHandler for Counting {
        async fn handle(&self, _: &Topic, _: &InboundMessage) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HandlerError::new("Counting", "boom"));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Counting"
        }
    }

    fn comment() -> InboundMessage {
        decode_frame(r#"{"type":"comment_added","data":{"incident_id":"A"}}"#)
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn dispatch_runs_only_matching_handlers() {
        let router = MessageRouter::new();
        let comments = Counting::new(false);
        let states = Counting::new(false);
        router.register(&[MessageKind::CommentAdded], comments.clone());
        router.register(&[MessageKind::StateChanged], states.clone());

        let ran = router.dispatch(&Topic::ListBroadcast, &comment()).await;

        assert_eq!(ran, 1);
        assert_eq!(comments.calls.load(Ordering::SeqCst), 1);
        assert_eq!(states.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_others() {
        let router = MessageRouter::new();
        let failing = Counting::new(true);
        let healthy = Counting::new(false);
        router.register(&[MessageKind::CommentAdded], failing.clone());
        router.register(&[MessageKind::CommentAdded], healthy.clone());

        assert_eq!(router.dispatch(&Topic::ListBroadcast, &comment()).await, 2);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn register_counts_per_kind() {
        let router = MessageRouter::new();
        router.register(
            &[MessageKind::UserJoined, MessageKind::UserLeft],
            Counting::new(false),
        );
        assert_eq!(router.handler_count(MessageKind::UserJoined), 1);
        assert_eq!(router.handler_count(MessageKind::UserLeft), 1);
        assert_eq!(router.handler_count(MessageKind::StateChanged), 0);
    }
}
