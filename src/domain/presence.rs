//! Presence - who else is viewing a resource.
//!
//! Push join/leave events are the primary signal. A periodic snapshot
//! reconciles the set, and TTL pruning drops records whose heartbeat stopped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::foundation::{ObserverId, ResourceId, Timestamp};

/// One observer currently viewing a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub resource_id: ResourceId,
    pub observer_id: ObserverId,
    pub display_name: String,
    pub last_seen: Timestamp,
}

/// Locally tracked presence for one resource.
#[derive(Debug, Clone)]
pub struct PresenceSet {
    resource_id: ResourceId,
    local: Option<ObserverId>,
    records: HashMap<ObserverId, PresenceRecord>,
}

impl PresenceSet {
    /// `local` is the observer running this instance; it is hidden from `others`.
    pub fn new(resource_id: ResourceId, local: Option<ObserverId>) -> Self {
        Self {
            resource_id,
            local,
            records: HashMap::new(),
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Records a join. Returns true if the observer was not present before.
    pub fn join(&mut self, observer: ObserverId, display_name: impl Into<String>, at: Timestamp) -> bool {
        let record = PresenceRecord {
            resource_id: self.resource_id.clone(),
            observer_id: observer.clone(),
            display_name: display_name.into(),
            last_seen: at,
        };
        self.records.insert(observer, record).is_none()
    }

    /// Records a leave. Returns true if the observer was present.
    pub fn leave(&mut self, observer: &ObserverId) -> bool {
        self.records.remove(observer).is_some()
    }

    /// Refreshes `last_seen` of a known observer.
    pub fn heartbeat(&mut self, observer: &ObserverId, at: Timestamp) -> bool {
        match self.records.get_mut(observer) {
            Some(record) => {
                if record.last_seen.is_before(&at) {
                    record.last_seen = at;
                }
                true
            }
            None => false,
        }
    }

    /// Replaces the set with an authoritative snapshot.
    ///
    /// Records for other resources are ignored.
    pub fn reconcile(&mut self, snapshot: Vec<PresenceRecord>) {
        self.records = snapshot
            .into_iter()
            .filter(|r| r.resource_id == self.resource_id)
            .map(|r| (r.observer_id.clone(), r))
            .collect();
    }

    /// Drops records not refreshed within `ttl` of `now`. Returns the removed observers.
    pub fn prune_expired(&mut self, now: Timestamp, ttl: Duration) -> Vec<ObserverId> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expired: Vec<ObserverId> = self
            .records
            .values()
            .filter(|r| now.duration_since(&r.last_seen).num_seconds() > ttl_secs)
            .map(|r| r.observer_id.clone())
            .collect();
        for id in &expired {
            self.records.remove(id);
        }
        expired
    }

    /// Everyone but the local observer, ordered by display name.
    pub fn others(&self) -> Vec<PresenceRecord> {
        let mut others: Vec<PresenceRecord> = self
            .records
            .values()
            .filter(|r| Some(&r.observer_id) != self.local.as_ref())
            .cloned()
            .collect();
        others.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.observer_id.cmp(&b.observer_id))
        });
        others
    }

    pub fn contains(&self, observer: &ObserverId) -> bool {
        self.records.contains_key(observer)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> ObserverId {
        ObserverId::new(s).unwrap()
    }

    fn set_for(local: &str) -> PresenceSet {
        PresenceSet::new(ResourceId::new("R").unwrap(), Some(oid(local)))
    }

    fn record(observer: &str, name: &str, at: Timestamp) -> PresenceRecord {
        PresenceRecord {
            resource_id: ResourceId::new("R").unwrap(),
            observer_id: oid(observer),
            display_name: name.into(),
            last_seen: at,
        }
    }

    #[test]
    fn join_then_leave_removes_observer() {
        let mut set = set_for("me");
        assert!(set.join(oid("u2"), "Bo", Timestamp::now()));
        assert!(set.leave(&oid("u2")));
        assert!(!set.contains(&oid("u2")));
        assert!(set.others().is_empty());
    }

    #[test]
    fn repeated_join_is_not_new() {
        let mut set = set_for("me");
        assert!(set.join(oid("u2"), "Bo", Timestamp::now()));
        assert!(!set.join(oid("u2"), "Bo", Timestamp::now()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn others_excludes_local_observer() {
        let mut set = set_for("me");
        let now = Timestamp::now();
        set.join(oid("me"), "Me", now);
        set.join(oid("u3"), "Cy", now);
        set.join(oid("u2"), "Bo", now);
        let names: Vec<String> = set.others().into_iter().map(|r| r.display_name).collect();
        assert_eq!(names, vec!["Bo".to_string(), "Cy".to_string()]);
    }

    #[test]
    fn reconcile_drops_missed_leaves_and_foreign_records() {
        let mut set = set_for("me");
        let now = Timestamp::now();
        set.join(oid("gone"), "Gone", now);
        let mut foreign = record("x", "X", now);
        foreign.resource_id = ResourceId::new("other").unwrap();
        set.reconcile(vec![record("u2", "Bo", now), foreign]);
        assert!(!set.contains(&oid("gone")));
        assert!(set.contains(&oid("u2")));
        assert!(!set.contains(&oid("x")));
    }

    #[test]
    fn prune_expired_uses_ttl() {
        let mut set = set_for("me");
        let start = Timestamp::now();
        set.join(oid("old"), "Old", start);
        set.join(oid("fresh"), "Fresh", start.plus_secs(300));
        let removed = set.prune_expired(start.plus_secs(400), Duration::from_secs(360));
        assert_eq!(removed, vec![oid("old")]);
        assert!(set.contains(&oid("fresh")));
    }

    #[test]
    fn heartbeat_refreshes_known_observers_only() {
        let mut set = set_for("me");
        let start = Timestamp::now();
        set.join(oid("u2"), "Bo", start);
        assert!(set.heartbeat(&oid("u2"), start.plus_secs(200)));
        assert!(!set.heartbeat(&oid("nobody"), start));
        let removed = set.prune_expired(start.plus_secs(400), Duration::from_secs(360));
        assert!(removed.is_empty());
    }
}
