//! PresenceApi port - Interface for the server's presence endpoint.
//!
//! Presence marks carry a server-side TTL; the tracker re-marks on a heartbeat
//! so a crashed client ages out instead of lingering.

use async_trait::async_trait;

use crate::domain::foundation::ResourceId;
use crate::domain::presence::PresenceRecord;
use crate::domain::topic::ObserverIdentity;

/// Errors that can occur in presence operations.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("presence request failed: {0}")]
    Request(String),

    #[error("presence endpoint returned status {0}")]
    Status(u16),

    #[error("presence response could not be decoded: {0}")]
    Decode(String),

    #[error("no signed-in observer")]
    NoObserver,
}

/// Port for marking and listing viewers of a resource.
#[async_trait]
pub trait PresenceApi: Send + Sync {
    /// Marks `observer` as viewing `resource`. Also used as the heartbeat.
    async fn mark(
        &self,
        resource: &ResourceId,
        observer: &ObserverIdentity,
    ) -> Result<(), PresenceError>;

    /// Removes the mark explicitly.
    async fn unmark(
        &self,
        resource: &ResourceId,
        observer: &ObserverIdentity,
    ) -> Result<(), PresenceError>;

    /// Full snapshot of who views `resource`.
    async fn list(&self, resource: &ResourceId) -> Result<Vec<PresenceRecord>, PresenceError>;
}
