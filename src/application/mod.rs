//! Application layer - Errors shared by every storage implementation
//!
//! This layer contains:
//! - Errors: Storage and configuration error types

pub mod errors;

pub use errors::{ConfigError, Entity, ErrorKind, StorageError, StorageResult};
