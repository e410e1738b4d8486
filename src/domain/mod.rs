//! Domain layer - Core business objects and the storage contract
//!
//! This layer contains:
//! - Entities: Core business objects (User, UserList, Group, GroupMessage)
//! - Traits: Abstractions for infrastructure (Store)

pub mod entities;
pub mod traits;
