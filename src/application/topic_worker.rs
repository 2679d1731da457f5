//! The task that owns one topic's connection.
//!
//! A worker serialises everything that happens to its topic: connection
//! transitions, frame routing and retry timers. Closures are interpreted
//! only through the worker's own state and the topic's release flag, so a
//! teardown is never mistaken for a failure.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use super::notifier::Notifier;
use super::router::MessageRouter;
use crate::domain::connection::{
    CloseCode, ConnectionState, ReconnectController, ReconnectPolicy, RetryDecision,
};
use crate::domain::foundation::StateMachine;
use crate::domain::message::{decode_frame, InboundMessage};
use crate::domain::topic::Topic;
use crate::ports::{
    EndpointResolver, Notice, NoticeKind, Transport, TransportError, TransportEvent, TransportLink,
};

/// What observers of a topic receive.
#[derive(Debug, Clone)]
pub enum TopicEvent {
    Message(Arc<InboundMessage>),
    Status(ConnectionState),
}

/// Collaborators shared by every worker.
#[derive(Clone)]
pub(crate) struct WorkerDeps {
    pub transport: Arc<dyn Transport>,
    pub endpoint: Arc<dyn EndpointResolver>,
    pub router: Arc<MessageRouter>,
    pub notifier: Arc<Notifier>,
    pub policy: ReconnectPolicy,
    pub connect_timeout: Duration,
}

pub(crate) struct TopicWorker {
    topic: Topic,
    deps: WorkerDeps,
    events: broadcast::Sender<TopicEvent>,
    state: watch::Sender<ConnectionState>,
    release: watch::Receiver<bool>,
}

enum PumpEnd {
    Released,
    Closed(CloseCode),
}

/// Resolves once the topic is released (or its registry entry is gone).
async fn released(release: &mut watch::Receiver<bool>) {
    let _ = release.wait_for(|released| *released).await;
}

impl TopicWorker {
    pub(crate) fn new(
        topic: Topic,
        deps: WorkerDeps,
        events: broadcast::Sender<TopicEvent>,
        state: watch::Sender<ConnectionState>,
        release: watch::Receiver<bool>,
    ) -> Self {
        Self {
            topic,
            deps,
            events,
            state,
            release,
        }
    }

    fn is_released(&self) -> bool {
        let flagged = *self.release.borrow();
        flagged || self.release.has_changed().is_err()
    }

    fn set_state(&self, next: ConnectionState) {
        let current = *self.state.borrow();
        if current == next {
            return;
        }
        match current.transition_to(next) {
            Ok(next) => {
                tracing::debug!(topic = %self.topic, from = %current, to = %next, "Connection state changed");
                self.state.send_replace(next);
                // No observers is fine
                let _ = self.events.send(TopicEvent::Status(next));
            }
            Err(e) => {
                tracing::warn!(topic = %self.topic, error = %e, "Ignored invalid connection transition");
            }
        }
    }

    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        let timeout = self.deps.connect_timeout;
        match tokio::time::timeout(timeout, self.deps.transport.connect(url)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    pub(crate) async fn run(self) {
        let mut controller = ReconnectController::new(self.deps.policy);
        let mut release = self.release.clone();

        loop {
            if self.is_released() {
                self.set_state(ConnectionState::Closed);
                return;
            }

            let url = match self.deps.endpoint.resolve(&self.topic) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(topic = %self.topic, error = %e, "Cannot open real-time connection");
                    self.deps.notifier.notify(Notice::persistent(
                        NoticeKind::ConfigurationError,
                        format!("Live updates unavailable: {}", e),
                    ));
                    self.set_state(ConnectionState::Closed);
                    return;
                }
            };

            self.set_state(ConnectionState::Connecting);
            let code = match self.connect(&url).await {
                Ok(mut link) => {
                    if self.is_released() {
                        // Released while connecting: close as soon as it opened
                        link.close(CloseCode::NORMAL);
                        self.set_state(ConnectionState::Closed);
                        return;
                    }
                    self.set_state(ConnectionState::Open);
                    controller.on_open();
                    match self.pump(&mut link).await {
                        PumpEnd::Released => {
                            link.close(CloseCode::NORMAL);
                            self.set_state(ConnectionState::Closed);
                            return;
                        }
                        PumpEnd::Closed(code) => code,
                    }
                }
                Err(e) => {
                    tracing::warn!(topic = %self.topic, error = %e, "Connection attempt failed");
                    CloseCode::ABNORMAL
                }
            };

            if !code.requires_reconnect(!self.is_released()) {
                tracing::debug!(topic = %self.topic, code = %code, "Connection closed");
                self.set_state(ConnectionState::Closed);
                return;
            }

            let decision = controller.on_unexpected_close();
            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    self.set_state(ConnectionState::Reconnecting);
                    tracing::info!(
                        topic = %self.topic,
                        code = %code,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Scheduling reconnect"
                    );
                    if decision.is_first_retry() {
                        self.deps.notifier.notify(Notice::transient(
                            NoticeKind::ConnectionRetrying,
                            "Connection lost, retrying",
                        ));
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = released(&mut release) => {
                            self.set_state(ConnectionState::Closed);
                            return;
                        }
                    }
                }
                RetryDecision::Exhausted => {
                    tracing::error!(
                        topic = %self.topic,
                        attempts = controller.attempts(),
                        "Giving up on reconnecting"
                    );
                    self.deps.notifier.notify(Notice::persistent(
                        NoticeKind::ReconnectFailed,
                        "Failed to reconnect. Reload to restore live updates",
                    ));
                    self.set_state(ConnectionState::Closed);
                    return;
                }
            }
        }
    }

    async fn pump(&self, link: &mut TransportLink) -> PumpEnd {
        let mut release = self.release.clone();
        loop {
            tokio::select! {
                biased;
                _ = released(&mut release) => return PumpEnd::Released,
                event = link.next_event() => match event {
                    Some(TransportEvent::Frame(text)) => self.on_frame(&text).await,
                    Some(TransportEvent::Closed(code)) => return PumpEnd::Closed(code),
                    Some(TransportEvent::Error(reason)) => {
                        tracing::warn!(topic = %self.topic, error = %reason, "Transport error");
                        return PumpEnd::Closed(CloseCode::ABNORMAL);
                    }
                    None => return PumpEnd::Closed(CloseCode::ABNORMAL),
                },
            }
        }
    }

    async fn on_frame(&self, text: &str) {
        match decode_frame(text) {
            Ok(Some(message)) => {
                self.deps.router.dispatch(&self.topic, &message).await;
                let _ = self.events.send(TopicEvent::Message(Arc::new(message)));
            }
            Ok(None) => {
                tracing::trace!(topic = %self.topic, "Ignored frame of unknown type");
            }
            Err(e) => {
                tracing::warn!(topic = %self.topic, error = %e, "Dropped malformed frame");
            }
        }
    }
}
