//! Storage core of the Hawk group-messaging server: users, groups, contact
//! lists and group messages behind one `Store` trait, with a durable JSON
//! store, a caching wrapper and a combined cache-over-durable store.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::errors::{ConfigError, Entity, ErrorKind, StorageError, StorageResult};
pub use domain::entities::{Group, GroupMessage, MessageKind, MessageRange, Sex, User, UserFilter, UserList};
pub use domain::traits::Store;
pub use infrastructure::config::Config;
pub use infrastructure::logging::Diagnostics;
pub use infrastructure::storage::{CacheConfig, CachedStore, CombinedStore, JsonStore, StoreCounts};
