//! Application layer - Services composing domain rules and ports.
//!
//! The registry owns topic connections; each topic's worker routes decoded
//! frames through the router to the handlers below.

pub mod advisories;
pub mod cache_sync;
pub mod live_sync;
pub mod notifier;
pub mod presence_tracker;
pub mod registry;
pub mod router;
pub mod topic_worker;
pub mod version_guard;

pub use advisories::{advisory_for, AdvisoryNotifier, ADVISORY_KINDS};
pub use cache_sync::{CacheSynchronizer, PROJECTION_KINDS};
pub use live_sync::{Collaborators, LiveSync, SyncError};
pub use notifier::Notifier;
pub use presence_tracker::{PresenceTracker, PRESENCE_KINDS};
pub use registry::{RegistrySettings, Subscription, TopicRegistry};
pub use router::MessageRouter;
pub use topic_worker::TopicEvent;
pub use version_guard::{GuardError, MutationTicket, VersionGuard, GUARDED_KINDS};
