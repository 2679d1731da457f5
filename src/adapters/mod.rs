//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the synchronization layer to external systems:
//! - `websocket` - Real-time transport and endpoint URLs
//! - `http` - Presence and mutation REST collaborators
//! - `memory` - In-memory and scripted stand-ins

pub mod http;
pub mod memory;
pub mod websocket;
