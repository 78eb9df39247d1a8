//! sesrelay Common - Shared types and utilities
//!
//! This crate provides configuration, error types and the transaction
//! type shared across all sesrelay components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, RelayError, Result, TransportError};
pub use types::Transaction;
