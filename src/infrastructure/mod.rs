//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Logging: Subscriber setup and injected diagnostics
//! - Storage: Data persistence and caching

pub mod config;
pub mod logging;
pub mod storage;
