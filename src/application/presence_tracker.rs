//! Presence tracking for resource feeds.
//!
//! Every active resource feed gets a session task that marks the local
//! observer present, re-marks it on the heartbeat interval, reconciles the
//! set against a full snapshot on the poll interval and unmarks on release.
//! Join/leave pushes update the set immediately and trigger an early
//! reconcile.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::PresenceSettings;
use crate::domain::foundation::{ResourceId, Timestamp};
use crate::domain::message::{InboundMessage, MessageBody, MessageKind};
use crate::domain::presence::{PresenceRecord, PresenceSet};
use crate::domain::topic::{ObserverIdentity, Topic};
use crate::ports::{CredentialStore, HandlerError, MessageHandler, PresenceApi, TopicLifecycle};

/// Message kinds the tracker consumes.
pub const PRESENCE_KINDS: [MessageKind; 2] = [MessageKind::UserJoined, MessageKind::UserLeft];

type Viewers = watch::Sender<Vec<PresenceRecord>>;

struct Session {
    set: Arc<Mutex<PresenceSet>>,
    viewers: Arc<Viewers>,
    release: watch::Sender<bool>,
    refresh: Arc<Notify>,
}

/// Tracks who else is viewing each subscribed resource.
pub struct PresenceTracker {
    api: Arc<dyn PresenceApi>,
    credentials: Arc<dyn CredentialStore>,
    settings: PresenceSettings,
    sessions: Mutex<HashMap<ResourceId, Session>>,
}

impl PresenceTracker {
    pub fn new(
        api: Arc<dyn PresenceApi>,
        credentials: Arc<dyn CredentialStore>,
        settings: PresenceSettings,
    ) -> Self {
        Self {
            api,
            credentials,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Live view of the other observers of `resource`, while its feed is active.
    pub fn viewers(&self, resource: &ResourceId) -> Option<watch::Receiver<Vec<PresenceRecord>>> {
        self.sessions().get(resource).map(|s| s.viewers.subscribe())
    }

    /// Current other observers of `resource`; empty when the feed is not active.
    pub fn others(&self, resource: &ResourceId) -> Vec<PresenceRecord> {
        self.sessions()
            .get(resource)
            .map(|s| lock(&s.set).others())
            .unwrap_or_default()
    }

    pub fn tracked_resources(&self) -> Vec<ResourceId> {
        let mut resources: Vec<ResourceId> = self.sessions().keys().cloned().collect();
        resources.sort();
        resources
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ResourceId, Session>> {
        lock(&self.sessions)
    }

    fn start(&self, resource: ResourceId) {
        let observer = self.credentials.current_observer();
        let set = Arc::new(Mutex::new(PresenceSet::new(
            resource.clone(),
            observer.as_ref().map(|o| o.id.clone()),
        )));
        let (viewers, _) = watch::channel(Vec::new());
        let viewers = Arc::new(viewers);
        let (release, released) = watch::channel(false);
        let refresh = Arc::new(Notify::new());

        let task = SessionTask {
            api: Arc::clone(&self.api),
            observer,
            resource: resource.clone(),
            set: Arc::clone(&set),
            viewers: Arc::clone(&viewers),
            settings: self.settings,
        };
        tokio::spawn(task.run(released, Arc::clone(&refresh)));

        let previous = self.sessions().insert(
            resource,
            Session {
                set,
                viewers,
                release,
                refresh,
            },
        );
        if let Some(previous) = previous {
            previous.release.send_replace(true);
        }
    }

    fn stop(&self, resource: &ResourceId) {
        if let Some(session) = self.sessions().remove(resource) {
            session.release.send_replace(true);
        }
    }

    fn apply_push(&self, resource: &ResourceId, message: &InboundMessage) {
        let sessions = self.sessions();
        let Some(session) = sessions.get(resource) else {
            return;
        };
        let others = {
            let mut set = lock(&session.set);
            match &message.body {
                MessageBody::UserJoined(change) => {
                    let name = if change.user_name.is_empty() {
                        change.user_id.to_string()
                    } else {
                        change.user_name.clone()
                    };
                    let at = message.sent_at.unwrap_or_else(Timestamp::now);
                    set.join(change.user_id.clone(), name, at);
                }
                MessageBody::UserLeft(change) => {
                    set.leave(&change.user_id);
                }
                _ => return,
            }
            set.others()
        };
        session.viewers.send_replace(others);
        session.refresh.notify_one();
    }
}

#[async_trait]
impl TopicLifecycle for PresenceTracker {
    async fn topic_activated(&self, topic: &Topic) {
        if let Topic::ResourceFeed(resource) = topic {
            self.start(resource.clone());
        }
    }

    async fn topic_released(&self, topic: &Topic) {
        if let Topic::ResourceFeed(resource) = topic {
            self.stop(resource);
        }
    }
}

#[async_trait]
impl MessageHandler for PresenceTracker {
    async fn handle(&self, topic: &Topic, message: &InboundMessage) -> Result<(), HandlerError> {
        let resource = match &message.body {
            MessageBody::UserJoined(change) | MessageBody::UserLeft(change) => change
                .incident_id
                .as_ref()
                .or_else(|| topic.resource_id()),
            _ => None,
        };
        if let Some(resource) = resource {
            self.apply_push(resource, message);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "PresenceTracker"
    }
}

/// One resource's heartbeat and poll loop.
struct SessionTask {
    api: Arc<dyn PresenceApi>,
    observer: Option<ObserverIdentity>,
    resource: ResourceId,
    set: Arc<Mutex<PresenceSet>>,
    viewers: Arc<Viewers>,
    settings: PresenceSettings,
}

impl SessionTask {
    async fn run(self, mut released: watch::Receiver<bool>, refresh: Arc<Notify>) {
        self.mark().await;

        let mut heartbeat = interval(self.settings.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        heartbeat.tick().await;
        let mut poll = interval(self.settings.poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = wait_released(&mut released) => break,
                _ = heartbeat.tick() => self.mark().await,
                _ = poll.tick() => self.reconcile().await,
                _ = refresh.notified() => self.reconcile().await,
            }
        }

        if let Some(observer) = &self.observer {
            if let Err(e) = self.api.unmark(&self.resource, observer).await {
                tracing::warn!(resource = %self.resource, error = %e, "Failed to remove presence");
            }
        }
        tracing::debug!(resource = %self.resource, "Presence session ended");
    }

    async fn mark(&self) {
        let Some(observer) = &self.observer else {
            tracing::debug!(resource = %self.resource, "No observer identity, not marking presence");
            return;
        };
        match self.api.mark(&self.resource, observer).await {
            Ok(()) => {
                lock(&self.set).heartbeat(&observer.id, Timestamp::now());
            }
            Err(e) => {
                tracing::warn!(resource = %self.resource, error = %e, "Failed to mark presence");
            }
        }
    }

    async fn reconcile(&self) {
        match self.api.list(&self.resource).await {
            Ok(snapshot) => lock(&self.set).reconcile(snapshot),
            Err(e) => {
                tracing::warn!(resource = %self.resource, error = %e, "Presence snapshot failed");
            }
        }
        let others = {
            let mut set = lock(&self.set);
            let expired = set.prune_expired(Timestamp::now(), self.settings.record_ttl);
            if !expired.is_empty() {
                tracing::debug!(resource = %self.resource, expired = expired.len(), "Pruned stale presence");
            }
            set.others()
        };
        self.viewers.send_replace(others);
    }
}

async fn wait_released(released: &mut watch::Receiver<bool>) {
    let _ = released.wait_for(|r| *r).await;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryPresenceApi, PresenceCall, StaticCredentialStore};
    use crate::domain::foundation::ObserverId;
    use crate::domain::message::PresenceChange;
    use std::time::Duration;

    fn rid(s: &str) -> ResourceId {
        ResourceId::new(s).unwrap()
    }

    fn oid(s: &str) -> ObserverId {
        ObserverId::new(s).unwrap()
    }

    fn tracker(api: Arc<InMemoryPresenceApi>) -> PresenceTracker {
        let credentials = Arc::new(StaticCredentialStore::new().with_observer(oid("me"), "Me"));
        PresenceTracker::new(api, credentials, PresenceSettings::default())
    }

    fn joined(user: &str, name: &str) -> InboundMessage {
        InboundMessage::new(MessageBody::UserJoined(PresenceChange {
            user_id: oid(user),
            user_name: name.into(),
            incident_id: None,
        }))
    }

    fn left(user: &str) -> InboundMessage {
        InboundMessage::new(MessageBody::UserLeft(PresenceChange {
            user_id: oid(user),
            user_name: String::new(),
            incident_id: None,
        }))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn activation_marks_and_release_unmarks() {
        let api = Arc::new(InMemoryPresenceApi::new());
        let tracker = tracker(Arc::clone(&api));
        let topic = Topic::resource(rid("42"));

        tracker.topic_activated(&topic).await;
        settle().await;
        assert!(api.is_marked(&rid("42"), &oid("me")));

        tracker.topic_released(&topic).await;
        settle().await;
        assert!(!api.is_marked(&rid("42"), &oid("me")));
        assert!(tracker.viewers(&rid("42")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn list_topic_has_no_presence_session() {
        let api = Arc::new(InMemoryPresenceApi::new());
        let tracker = tracker(Arc::clone(&api));

        tracker.topic_activated(&Topic::ListBroadcast).await;
        settle().await;

        assert!(tracker.tracked_resources().is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_re_marks_on_interval() {
        let api = Arc::new(InMemoryPresenceApi::new());
        let tracker = tracker(Arc::clone(&api));
        tracker.topic_activated(&Topic::resource(rid("42"))).await;
        settle().await;
        assert_eq!(api.mark_count(), 1);

        tokio::time::sleep(Duration::from_secs(181)).await;
        settle().await;
        assert_eq!(api.mark_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn join_then_leave_leaves_observer_out() {
        let api = Arc::new(InMemoryPresenceApi::new());
        let tracker = tracker(Arc::clone(&api));
        let topic = Topic::resource(rid("42"));
        tracker.topic_activated(&topic).await;
        settle().await;

        tracker.handle(&topic, &joined("u2", "Bea")).await.unwrap();
        assert_eq!(tracker.others(&rid("42")).len(), 1);

        tracker.handle(&topic, &left("u2")).await.unwrap();
        settle().await;
        assert!(tracker.others(&rid("42")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn push_triggers_snapshot_reconcile() {
        let api = Arc::new(InMemoryPresenceApi::new().with_viewer(rid("42"), oid("u3"), "Cal"));
        let tracker = tracker(Arc::clone(&api));
        let topic = Topic::resource(rid("42"));
        tracker.topic_activated(&topic).await;
        settle().await;
        let lists_before = api
            .calls()
            .iter()
            .filter(|c| matches!(c, PresenceCall::List(_)))
            .count();

        tracker.handle(&topic, &joined("u2", "Bea")).await.unwrap();
        settle().await;

        let lists_after = api
            .calls()
            .iter()
            .filter(|c| matches!(c, PresenceCall::List(_)))
            .count();
        assert_eq!(lists_after, lists_before + 1);
        let names: Vec<String> = tracker
            .others(&rid("42"))
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        assert_eq!(names, vec!["Cal".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn local_observer_is_hidden_from_viewers() {
        let api = Arc::new(InMemoryPresenceApi::new().with_viewer(rid("42"), oid("u3"), "Cal"));
        let tracker = tracker(Arc::clone(&api));
        tracker.topic_activated(&Topic::resource(rid("42"))).await;
        settle().await;

        let viewers = tracker.viewers(&rid("42")).unwrap();
        let ids: Vec<ObserverId> = viewers.borrow().iter().map(|r| r.observer_id.clone()).collect();
        assert_eq!(ids, vec![oid("u3")]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_api_does_not_stop_push_updates() {
        let api = Arc::new(InMemoryPresenceApi::new());
        api.fail_requests(true);
        let tracker = tracker(Arc::clone(&api));
        let topic = Topic::resource(rid("42"));
        tracker.topic_activated(&topic).await;
        settle().await;

        tracker.handle(&topic, &joined("u2", "Bea")).await.unwrap();
        settle().await;
        assert_eq!(tracker.others(&rid("42")).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_poll_follows_snapshot_without_pushes() {
        let api = Arc::new(InMemoryPresenceApi::new().with_viewer(rid("42"), oid("u3"), "Cal"));
        let tracker = tracker(Arc::clone(&api));
        let topic = Topic::resource(rid("42"));
        tracker.topic_activated(&topic).await;
        settle().await;
        assert_eq!(tracker.others(&rid("42")).len(), 1);

        api.insert(PresenceRecord {
            resource_id: rid("42"),
            observer_id: oid("u4"),
            display_name: "Dee".into(),
            last_seen: Timestamp::now(),
        });
        api.unmark(&rid("42"), &ObserverIdentity::new(oid("u3"), "Cal"))
            .await
            .unwrap();

        // Nothing changes locally until the next poll
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(tracker.others(&rid("42"))[0].observer_id, oid("u3"));

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        let ids: Vec<ObserverId> = tracker
            .others(&rid("42"))
            .into_iter()
            .map(|r| r.observer_id)
            .collect();
        assert_eq!(ids, vec![oid("u4")]);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_prunes_records_past_ttl() {
        let api = Arc::new(InMemoryPresenceApi::new().with_viewer(rid("42"), oid("u3"), "Cal"));
        api.insert(PresenceRecord {
            resource_id: rid("42"),
            observer_id: oid("ghost"),
            display_name: "Ghost".into(),
            last_seen: Timestamp::now().plus_secs(-3600),
        });
        let tracker = tracker(Arc::clone(&api));
        tracker.topic_activated(&Topic::resource(rid("42"))).await;
        settle().await;

        let ids: Vec<ObserverId> = tracker
            .others(&rid("42"))
            .into_iter()
            .map(|r| r.observer_id)
            .collect();
        assert_eq!(ids, vec![oid("u3")]);
    }
}
