//! Infrastructure layer module
//!
//! This module contains the adapters behind the domain ports:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Markdown and in-memory stores
//! - Alert sinks
//! - The table-driven pass-through worker
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod logging;
pub mod notify;
pub mod store;
pub mod workers;
