//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that infrastructure adapters implement:
//! - Worker: the specialized units that process tasks
//! - LogStore / RuleStore / StoreProvider: markdown-backed persistence
//! - AlertSink: outbound alert delivery

pub mod alert_sink;
pub mod errors;
pub mod store;
pub mod worker;

pub use alert_sink::AlertSink;
pub use errors::{DeliveryError, StoreError, WorkerError};
pub use store::{LogStore, RuleStore, StoreProvider};
pub use worker::Worker;
