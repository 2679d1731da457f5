//! ProjectionStore port - The locally cached projections of server data.
//!
//! The data-fetching layer owns creation and eviction of entries. This layer
//! only patches, replaces and invalidates them.

use serde_json::Value;
use std::fmt;

use crate::domain::foundation::ResourceId;

/// Cache key of one projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProjectionKey {
    /// A list of summaries, keyed by the query that produced it.
    List(String),
    /// The detail record of one resource.
    Detail(ResourceId),
}

impl ProjectionKey {
    pub fn list(query: impl Into<String>) -> Self {
        ProjectionKey::List(query.into())
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ProjectionKey::List(_))
    }
}

impl fmt::Display for ProjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionKey::List(query) => write!(f, "list[{}]", query),
            ProjectionKey::Detail(id) => write!(f, "detail[{}]", id),
        }
    }
}

/// Port for the shared projection cache.
pub trait ProjectionStore: Send + Sync {
    /// Keys of every cached list projection.
    fn list_keys(&self) -> Vec<ProjectionKey>;

    /// Runs `apply` on the cached value in place. Returns false if absent.
    fn update(&self, key: &ProjectionKey, apply: &mut dyn FnMut(&mut Value)) -> bool;

    fn get(&self, key: &ProjectionKey) -> Option<Value>;

    fn set(&self, key: ProjectionKey, value: Value);

    /// Marks the entry stale so its owner refetches it.
    fn invalidate(&self, key: &ProjectionKey);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_display_their_scope() {
        assert_eq!(ProjectionKey::list("open").to_string(), "list[open]");
        let detail = ProjectionKey::Detail(ResourceId::new("7").unwrap());
        assert_eq!(detail.to_string(), "detail[7]");
        assert!(!detail.is_list());
    }
}
