//! Projection cache held in a map.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::ports::{ProjectionKey, ProjectionStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    stale: bool,
}

/// Projection store for tests and hosts without a query cache.
///
/// `invalidate` keeps the value but marks it stale, the way query caches
/// keep serving data until the refetch lands.
#[derive(Debug, Default)]
pub struct InMemoryProjectionStore {
    entries: Mutex<HashMap<ProjectionKey, Entry>>,
    invalidations: Mutex<Vec<ProjectionKey>>,
}

impl InMemoryProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: ProjectionKey, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_stale(&self, key: &ProjectionKey) -> bool {
        lock(&self.entries).get(key).map_or(false, |e| e.stale)
    }

    /// Every key `invalidate` was called with, in order.
    pub fn invalidations(&self) -> Vec<ProjectionKey> {
        lock(&self.invalidations).clone()
    }
}

impl ProjectionStore for InMemoryProjectionStore {
    fn list_keys(&self) -> Vec<ProjectionKey> {
        let mut keys: Vec<ProjectionKey> = lock(&self.entries)
            .keys()
            .filter(|k| k.is_list())
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn update(&self, key: &ProjectionKey, apply: &mut dyn FnMut(&mut Value)) -> bool {
        match lock(&self.entries).get_mut(key) {
            Some(entry) => {
                apply(&mut entry.value);
                true
            }
            None => false,
        }
    }

    fn get(&self, key: &ProjectionKey) -> Option<Value> {
        lock(&self.entries).get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: ProjectionKey, value: Value) {
        lock(&self.entries).insert(key, Entry { value, stale: false });
    }

    fn invalidate(&self, key: &ProjectionKey) {
        if let Some(entry) = lock(&self.entries).get_mut(key) {
            entry.stale = true;
        }
        lock(&self.invalidations).push(key.clone());
    }
}
