//! Transport port - Interface for the persistent real-time channel.
//!
//! An adapter turns a URL into a `TransportLink`: a stream of transport
//! events plus a one-shot close handle. Transport failures are never thrown
//! at callers once a link exists; they arrive as `TransportEvent`s and the
//! topic worker alone decides what they mean.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::domain::connection::CloseCode;
use crate::domain::topic::Topic;

/// Something that happened on an established link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A UTF-8 text frame.
    Frame(String),
    /// The peer or the network closed the link.
    Closed(CloseCode),
    /// A socket-level failure. The link is unusable afterwards.
    Error(String),
}

/// Errors establishing a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// An open link to the server.
#[derive(Debug)]
pub struct TransportLink {
    events: mpsc::Receiver<TransportEvent>,
    closer: Option<oneshot::Sender<CloseCode>>,
}

/// Adapter-side half of a link: feeds events and learns about local closes.
#[derive(Debug)]
pub struct LinkDriver {
    pub events: mpsc::Sender<TransportEvent>,
    pub close_requested: oneshot::Receiver<CloseCode>,
}

impl TransportLink {
    /// Creates a connected link/driver pair.
    pub fn channel(capacity: usize) -> (TransportLink, LinkDriver) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel();
        (
            TransportLink {
                events: events_rx,
                closer: Some(close_tx),
            },
            LinkDriver {
                events: events_tx,
                close_requested: close_rx,
            },
        )
    }

    /// Next event; `None` once the adapter dropped its side.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Asks the adapter to close with `code`. Later calls are no-ops.
    pub fn close(&mut self, code: CloseCode) {
        if let Some(closer) = self.closer.take() {
            // The adapter may already be gone; nothing to do then.
            let _ = closer.send(code);
        }
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.close(CloseCode::NORMAL);
    }
}

/// A connection attempt cannot even start. Retrying will not help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("no real-time endpoint configured")]
    MissingEndpoint,

    #[error("no access token available")]
    MissingCredential,

    #[error("endpoint url is invalid: {0}")]
    InvalidUrl(String),
}

/// Resolves the URL a topic connects to, credential included.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, topic: &Topic) -> Result<String, EndpointError>;
}

/// Port for opening real-time links.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a link to `url`, resolving once the transport acknowledged the open.
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_from_driver_to_link() {
        let (mut link, driver) = TransportLink::channel(4);
        driver
            .events
            .send(TransportEvent::Frame("hi".into()))
            .await
            .unwrap();
        assert_eq!(link.next_event().await, Some(TransportEvent::Frame("hi".into())));
    }

    #[tokio::test]
    async fn close_reaches_driver_once() {
        let (mut link, driver) = TransportLink::channel(4);
        link.close(CloseCode::GOING_AWAY);
        link.close(CloseCode::NORMAL);
        assert_eq!(driver.close_requested.await.unwrap(), CloseCode::GOING_AWAY);
    }

    #[tokio::test]
    async fn dropping_link_closes_normally() {
        let (link, driver) = TransportLink::channel(4);
        drop(link);
        assert_eq!(driver.close_requested.await.unwrap(), CloseCode::NORMAL);
    }

    #[test]
    fn transport_is_object_safe() {
        fn _accepts(_: &dyn Transport) {}
        fn _resolver(_: &dyn EndpointResolver) {}
    }
}
