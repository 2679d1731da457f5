//! Topic - a logical subscription scope.
//!
//! Every distinct `Topic` value maps to at most one physical connection.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::foundation::{ObserverId, ResourceId};

/// A logical subscription scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "resource_id", rename_all = "snake_case")]
pub enum Topic {
    /// One shared channel for every list observer.
    ListBroadcast,
    /// One channel per distinct resource instance.
    ResourceFeed(ResourceId),
}

/// Discriminates the two topic shapes without their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    List,
    Resource,
}

/// Observer identity sent on resource-scope connections for presence display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverIdentity {
    pub id: ObserverId,
    pub display_name: String,
}

impl ObserverIdentity {
    pub fn new(id: ObserverId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

impl Topic {
    pub fn resource(id: ResourceId) -> Self {
        Topic::ResourceFeed(id)
    }

    pub fn kind(&self) -> TopicKind {
        match self {
            Topic::ListBroadcast => TopicKind::List,
            Topic::ResourceFeed(_) => TopicKind::Resource,
        }
    }

    /// The resource this topic follows, if resource-scoped.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            Topic::ListBroadcast => None,
            Topic::ResourceFeed(id) => Some(id),
        }
    }

    /// Query parameters identifying this topic on the wire, excluding the credential.
    ///
    /// List scope sends `channel=<list_channel>`; resource scope sends
    /// `incident_id`, plus the observer identity when one is known.
    pub fn query_pairs(
        &self,
        list_channel: &str,
        observer: Option<&ObserverIdentity>,
    ) -> Vec<(&'static str, String)> {
        match self {
            Topic::ListBroadcast => vec![("channel", list_channel.to_string())],
            Topic::ResourceFeed(id) => {
                let mut pairs = vec![("incident_id", id.to_string())];
                if let Some(observer) = observer {
                    pairs.push(("user_id", observer.id.to_string()));
                    pairs.push(("user_name", observer.display_name.clone()));
                }
                pairs
            }
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::ListBroadcast => write!(f, "list-broadcast"),
            Topic::ResourceFeed(id) => write!(f, "incident:{}", id),
        }
    }
}
