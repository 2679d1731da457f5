//! Live Sync - Live resource synchronization layer
//!
//! Keeps locally cached incident projections in step with a real-time push
//! channel. One shared connection per topic, bounded reconnection, merge of
//! pushed changes into cached lists and details, presence of other viewers
//! and a guard against mutating stale state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
