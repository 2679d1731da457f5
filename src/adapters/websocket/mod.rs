//! WebSocket adapters for topic connections.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     TopicRegistry                        │
//! │   list-broadcast        incident:42        incident:77   │
//! └──────────────────────────────────────────────────────────┘
//!                 │ resolves url        │ connects
//!                 ▼                     ▼
//! ┌──────────────────────┐   ┌──────────────────────────────┐
//! │   EndpointBuilder    │   │     TungsteniteTransport     │
//! │   base + path +      │   │   socket task per link:      │
//! │   topic query +      │   │   frames -> TransportEvent   │
//! │   token              │   │   close request -> Close     │
//! └──────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`endpoint`] - Builds topic URLs from configuration and credentials
//! - [`transport`] - `tokio-tungstenite` implementation of `Transport`

pub mod endpoint;
pub mod transport;

pub use endpoint::EndpointBuilder;
pub use transport::TungsteniteTransport;
