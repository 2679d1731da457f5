//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the synchronization layer and the outside world. Adapters implement them.
//!
//! ## Channel Ports
//!
//! - `Transport` - Opens persistent real-time links
//! - `EndpointResolver` - Builds a topic's URL from endpoint and credential
//! - `MessageHandler` - Consumes routed inbound messages
//! - `TopicLifecycle` - Hooks on topic activation and release
//!
//! ## Collaborator Ports
//!
//! - `CredentialStore` - Read-only bearer credential and observer identity
//! - `PresenceApi` - Presence mark/unmark/list endpoint
//! - `ProjectionStore` - Cached projections to patch and invalidate
//! - `NotificationSurface` - Advisory toasts
//! - `MutationGateway` - Version-carrying resource mutations

mod credential_store;
mod message_handler;
mod mutation_gateway;
mod notification;
mod presence_api;
mod projection_store;
mod transport;

pub use credential_store::CredentialStore;
pub use message_handler::{HandlerError, MessageHandler, TopicLifecycle};
pub use mutation_gateway::{MutationError, MutationGateway, MutationRequest};
pub use notification::{Notice, NoticeKind, NotificationSurface};
pub use presence_api::{PresenceApi, PresenceError};
pub use projection_store::{ProjectionKey, ProjectionStore};
pub use transport::{
    EndpointError, EndpointResolver, LinkDriver, Transport, TransportError, TransportEvent, TransportLink,
};
