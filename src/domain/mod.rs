//! Domain layer for the switchboard coordination core
//!
//! This module contains the core models, errors and the ports that
//! infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, MemoryLogError};
