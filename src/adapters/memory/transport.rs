//! Transport whose connection outcomes are scripted by the test.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};

use super::lock;
use crate::domain::connection::CloseCode;
use crate::ports::{Transport, TransportError, TransportEvent, TransportLink};

enum Script {
    Accept,
    Refuse(String),
    Gated(oneshot::Receiver<()>),
}

/// Server side of one accepted scripted link.
#[derive(Debug)]
pub struct ScriptedLink {
    url: String,
    events: mpsc::Sender<TransportEvent>,
    close_requested: Mutex<Option<oneshot::Receiver<CloseCode>>>,
    closed_with: Mutex<Option<CloseCode>>,
}

impl ScriptedLink {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pushes a text frame to the client. Returns false if the client is gone.
    pub async fn send_frame(&self, text: &str) -> bool {
        self.events
            .send(TransportEvent::Frame(text.to_string()))
            .await
            .is_ok()
    }

    /// Closes from the server side with `code`.
    pub async fn close_with(&self, code: CloseCode) -> bool {
        self.events.send(TransportEvent::Closed(code)).await.is_ok()
    }

    /// Reports a socket-level failure.
    pub async fn fail(&self, reason: &str) -> bool {
        self.events
            .send(TransportEvent::Error(reason.to_string()))
            .await
            .is_ok()
    }

    /// The code the client closed this link with, if it did.
    pub fn client_close(&self) -> Option<CloseCode> {
        let mut closed_with = lock(&self.closed_with);
        if closed_with.is_none() {
            if let Some(rx) = lock(&self.close_requested).as_mut() {
                *closed_with = rx.try_recv().ok();
            }
        }
        *closed_with
    }
}

/// Scripted `Transport`.
///
/// Each `connect` call consumes the next scripted outcome; with an empty
/// script the connection is accepted.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<String>>,
    links: Mutex<Vec<Arc<ScriptedLink>>>,
    changed: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_next(&self) {
        lock(&self.script).push_back(Script::Accept);
    }

    pub fn refuse_next(&self, times: usize) {
        let mut script = lock(&self.script);
        for _ in 0..times {
            script.push_back(Script::Refuse("connection refused".into()));
        }
    }

    /// The next connect waits until the returned sender fires (or is dropped).
    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.script).push_back(Script::Gated(rx));
        tx
    }

    /// Number of `connect` calls so far, successful or not.
    pub fn connect_count(&self) -> usize {
        lock(&self.attempts).len()
    }

    pub fn urls(&self) -> Vec<String> {
        lock(&self.attempts).clone()
    }

    pub fn links(&self) -> Vec<Arc<ScriptedLink>> {
        lock(&self.links).clone()
    }

    pub fn link(&self, index: usize) -> Option<Arc<ScriptedLink>> {
        lock(&self.links).get(index).cloned()
    }

    /// Waits until at least `n` connect calls happened.
    pub async fn wait_for_connects(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.connect_count() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Waits until at least `n` links were accepted and returns the latest.
    pub async fn wait_for_link(&self, n: usize) -> Arc<ScriptedLink> {
        loop {
            let notified = self.changed.notified();
            if let Some(link) = self.link(n.saturating_sub(1)) {
                return link;
            }
            notified.await;
        }
    }

    fn accept(&self, url: &str) -> TransportLink {
        let (link, driver) = TransportLink::channel(64);
        let scripted = Arc::new(ScriptedLink {
            url: url.to_string(),
            events: driver.events,
            close_requested: Mutex::new(Some(driver.close_requested)),
            closed_with: Mutex::new(None),
        });
        lock(&self.links).push(scripted);
        self.changed.notify_waiters();
        link
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        lock(&self.attempts).push(url.to_string());
        let next = lock(&self.script).pop_front();
        self.changed.notify_waiters();
        match next {
            None | Some(Script::Accept) => Ok(self.accept(url)),
            Some(Script::Refuse(reason)) => Err(TransportError::Connect(reason)),
            Some(Script::Gated(gate)) => {
                // A dropped sender opens the gate too.
                let _ = gate.await;
                Ok(self.accept(url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_outcomes_are_consumed_in_order() {
        let transport = ScriptedTransport::new();
        transport.refuse_next(1);
        assert!(transport.connect("ws://a").await.is_err());
        assert!(transport.connect("ws://a").await.is_ok());
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(transport.links().len(), 1);
    }

    #[tokio::test]
    async fn client_close_is_observed() {
        let transport = ScriptedTransport::new();
        let mut link = transport.connect("ws://a").await.unwrap();
        let scripted = transport.link(0).unwrap();
        assert_eq!(scripted.client_close(), None);
        link.close(CloseCode::NORMAL);
        assert_eq!(scripted.client_close(), Some(CloseCode::NORMAL));
    }

    #[tokio::test]
    async fn frames_reach_the_client() {
        let transport = ScriptedTransport::new();
        let mut link = transport.connect("ws://a").await.unwrap();
        let scripted = transport.wait_for_link(1).await;
        assert!(scripted.send_frame("{}").await);
        assert_eq!(link.next_event().await, Some(TransportEvent::Frame("{}".into())));
    }
}
