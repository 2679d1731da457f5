//! Connection lifecycle for one topic's physical channel.
//!
//! No knowledge of message semantics lives here.

mod backoff;
mod state;

pub use backoff::{ReconnectController, ReconnectPolicy, RetryDecision};
pub use state::{CloseCode, ConnectionState};
