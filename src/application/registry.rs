//! Topic registry - one shared connection per topic, reference counted.
//!
//! # Architecture
//!
//! ```text
//! Topic: list-broadcast      Topic: incident:42
//! ├── subscriber a           ├── subscriber d
//! ├── subscriber b           └── subscriber e
//! └── subscriber c
//!        │                          │
//!   topic worker               topic worker
//!   (one connection)           (one connection)
//! ```
//!
//! The first subscription to a topic spawns its worker; the last
//! unsubscription (or dropped handle) releases it. All bookkeeping happens
//! under one async mutex, so concurrent subscribes can never start a second
//! worker.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use super::notifier::Notifier;
use super::router::MessageRouter;
use super::topic_worker::{TopicEvent, TopicWorker, WorkerDeps};
use crate::domain::connection::{ConnectionState, ReconnectPolicy};
use crate::domain::foundation::SubscriberId;
use crate::domain::topic::Topic;
use crate::ports::{EndpointResolver, TopicLifecycle, Transport};

/// Tunables of the registry and its workers.
#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    pub policy: ReconnectPolicy,
    pub connect_timeout: Duration,
    /// Buffer of each topic's observer broadcast channel.
    pub channel_capacity: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 128,
        }
    }
}

/// A live interest in a topic.
///
/// Hand it back to `unsubscribe` when done. Dropping it releases the
/// interest too.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    topic: Topic,
    events: broadcast::Receiver<TopicEvent>,
    registry: Option<Weak<Shared>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Next event for this subscriber; `None` once the topic is gone.
    ///
    /// A slow subscriber that fell behind skips what it missed.
    pub async fn next_event(&mut self) -> Option<TopicEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "Subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(shared) = self.registry.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(topic = %self.topic, subscriber = %self.id, "Subscription dropped outside a runtime");
            return;
        };
        let topic = self.topic.clone();
        let id = self.id;
        runtime.spawn(async move { shared.release(topic, id).await });
    }
}

struct TopicEntry {
    subscribers: HashSet<SubscriberId>,
    events: broadcast::Sender<TopicEvent>,
    state: watch::Receiver<ConnectionState>,
    release: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl TopicEntry {
    fn worker_done(&self) -> bool {
        self.worker.is_finished() || *self.state.borrow() == ConnectionState::Closed
    }
}

/// A released worker that has not stopped yet.
struct ClosingWorker {
    state: watch::Receiver<ConnectionState>,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct Topics {
    live: HashMap<Topic, TopicEntry>,
    closing: HashMap<Topic, ClosingWorker>,
}

struct Shared {
    topics: Mutex<Topics>,
    deps: WorkerDeps,
    channel_capacity: usize,
    lifecycle: Vec<Arc<dyn TopicLifecycle>>,
}

impl Shared {
    fn spawn_worker(
        &self,
        topic: &Topic,
        events: &broadcast::Sender<TopicEvent>,
    ) -> (watch::Receiver<ConnectionState>, watch::Sender<bool>, JoinHandle<()>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (release_tx, release_rx) = watch::channel(false);
        let worker = TopicWorker::new(
            topic.clone(),
            self.deps.clone(),
            events.clone(),
            state_tx,
            release_rx,
        );
        let handle = tokio::spawn(worker.run());
        (state_rx, release_tx, handle)
    }

    async fn subscribe(self: &Arc<Self>, topic: Topic) -> Subscription {
        let id = SubscriberId::new();
        let registry = Some(Arc::downgrade(self));
        let mut topics = self.topics.lock().await;

        if let Some(entry) = topics.live.get_mut(&topic) {
            entry.subscribers.insert(id);
            if entry.worker_done() {
                tracing::info!(topic = %topic, "Reviving topic connection");
                let (state, release, worker) = self.spawn_worker(&topic, &entry.events);
                entry.state = state;
                entry.release = release;
                entry.worker = worker;
            }
            tracing::debug!(topic = %topic, subscriber = %id, count = entry.subscribers.len(), "Subscribed");
            return Subscription {
                id,
                topic,
                events: entry.events.subscribe(),
                registry,
            };
        }

        topics.closing.retain(|_, closing| !closing.worker.is_finished());
        retire(&mut topics, &topic).await;

        let (events_tx, events_rx) = broadcast::channel(self.channel_capacity);
        let (state, release, worker) = self.spawn_worker(&topic, &events_tx);
        topics.live.insert(
            topic.clone(),
            TopicEntry {
                subscribers: HashSet::from([id]),
                events: events_tx,
                state,
                release,
                worker,
            },
        );
        tracing::debug!(topic = %topic, subscriber = %id, "Topic activated");
        for hook in &self.lifecycle {
            hook.topic_activated(&topic).await;
        }

        Subscription {
            id,
            topic,
            events: events_rx,
            registry,
        }
    }

    /// Removes `id` from `topic`; a no-op if it is already gone.
    async fn release(&self, topic: Topic, id: SubscriberId) {
        let mut topics = self.topics.lock().await;

        let Some(entry) = topics.live.get_mut(&topic) else {
            return;
        };
        if !entry.subscribers.remove(&id) {
            return;
        }
        tracing::debug!(topic = %topic, subscriber = %id, count = entry.subscribers.len(), "Unsubscribed");
        if !entry.subscribers.is_empty() {
            return;
        }

        if let Some(entry) = topics.live.remove(&topic) {
            // The worker cancels any pending retry and closes normally
            entry.release.send_replace(true);
            if !entry.worker.is_finished() {
                topics.closing.insert(
                    topic.clone(),
                    ClosingWorker {
                        state: entry.state,
                        worker: entry.worker,
                    },
                );
            }
        }
        tracing::debug!(topic = %topic, "Topic released");
        for hook in &self.lifecycle {
            hook.topic_released(&topic).await;
        }
    }
}

/// Stops a released worker of `topic` before a new one takes over.
///
/// A worker still connecting holds no link yet and is aborted; any
/// other has already been told to close and finishes promptly.
async fn retire(topics: &mut Topics, topic: &Topic) {
    let Some(closing) = topics.closing.remove(topic) else {
        return;
    };
    if closing.worker.is_finished() {
        return;
    }
    if *closing.state.borrow() == ConnectionState::Connecting {
        tracing::debug!(topic = %topic, "Aborting released worker still connecting");
        closing.worker.abort();
    }
    let _ = closing.worker.await;
}

/// Injectable owner of every topic's connection.
pub struct TopicRegistry {
    shared: Arc<Shared>,
}

impl TopicRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: Arc<dyn EndpointResolver>,
        router: Arc<MessageRouter>,
        notifier: Arc<Notifier>,
        settings: RegistrySettings,
    ) -> Self {
        let shared = Shared {
            topics: Mutex::new(Topics::default()),
            deps: WorkerDeps {
                transport,
                endpoint,
                router,
                notifier,
                policy: settings.policy,
                connect_timeout: settings.connect_timeout,
            },
            channel_capacity: settings.channel_capacity.max(1),
            lifecycle: Vec::new(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Adds hooks run on a topic's first subscribe and last unsubscribe.
    ///
    /// Hooks run while the registry is locked and must return promptly.
    /// They can only be added before the first subscription.
    pub fn with_lifecycle(mut self, hook: Arc<dyn TopicLifecycle>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.lifecycle.push(hook),
            None => tracing::warn!("Lifecycle hook added after subscriptions exist, ignored"),
        }
        self
    }

    /// Registers interest in `topic`, opening its connection if none exists.
    pub async fn subscribe(&self, topic: Topic) -> Subscription {
        self.shared.subscribe(topic).await
    }

    /// Drops interest. The last subscriber's departure releases the topic.
    pub async fn unsubscribe(&self, mut subscription: Subscription) {
        subscription.registry = None;
        self.shared
            .release(subscription.topic.clone(), subscription.id)
            .await;
    }

    /// Current connection state, if the topic is live.
    pub async fn state(&self, topic: &Topic) -> Option<ConnectionState> {
        let topics = self.shared.topics.lock().await;
        topics.live.get(topic).map(|entry| *entry.state.borrow())
    }

    /// A receiver following the topic's connection state.
    pub async fn watch_state(&self, topic: &Topic) -> Option<watch::Receiver<ConnectionState>> {
        let topics = self.shared.topics.lock().await;
        topics.live.get(topic).map(|entry| entry.state.clone())
    }

    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        let topics = self.shared.topics.lock().await;
        topics.live.get(topic).map_or(0, |entry| entry.subscribers.len())
    }

    pub async fn active_topics(&self) -> Vec<Topic> {
        let topics = self.shared.topics.lock().await;
        topics.live.keys().cloned().collect()
    }

    /// Releases every topic regardless of subscribers.
    pub async fn shutdown(&self) {
        let (live, closing): (Vec<(Topic, TopicEntry)>, Vec<(Topic, ClosingWorker)>) = {
            let mut topics = self.shared.topics.lock().await;
            (topics.live.drain().collect(), topics.closing.drain().collect())
        };
        for (topic, entry) in live {
            entry.release.send_replace(true);
            for hook in &self.shared.lifecycle {
                hook.topic_released(&topic).await;
            }
            if let Err(e) = entry.worker.await {
                tracing::warn!(topic = %topic, error = %e, "Topic worker ended abnormally");
            }
        }
        for (topic, closing) in closing {
            if let Err(e) = closing.worker.await {
                tracing::warn!(topic = %topic, error = %e, "Topic worker ended abnormally");
            }
        }
    }
}
