//! In-memory and scripted port implementations.
//!
//! Deterministic stand-ins for the external collaborators. Tests drive them
//! directly; embedding hosts can use the projection store and static
//! credential store as-is.

mod credential_store;
mod mutation_gateway;
mod notification;
mod presence_api;
mod projection_store;
mod transport;

pub use credential_store::StaticCredentialStore;
pub use mutation_gateway::ScriptedMutationGateway;
pub use notification::RecordingSurface;
pub use presence_api::{InMemoryPresenceApi, PresenceCall};
pub use projection_store::InMemoryProjectionStore;
pub use transport::{ScriptedLink, ScriptedTransport};

use std::sync::{Mutex, MutexGuard};

// Test doubles recover from poisoning rather than cascade a panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
