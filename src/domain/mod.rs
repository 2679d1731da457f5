//! Domain layer containing the synchronization rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, state machine trait)
//! - `topic` - Logical subscription scopes
//! - `connection` - Connection lifecycle, closure codes and reconnection policy
//! - `message` - Inbound wire frames and their decoding
//! - `projection` - Structural merge rules for cached list and detail projections
//! - `presence` - The set of observers viewing a resource
//! - `version_guard` - Staleness assessment for pending local mutations

pub mod connection;
pub mod foundation;
pub mod message;
pub mod presence;
pub mod projection;
pub mod topic;
pub mod version_guard;
