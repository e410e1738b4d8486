//! Storage implementations
//!
//! - `JsonStore`: durable document store, the source of truth
//! - `CachedStore`: bounded cache wrapped around any other store
//! - `CombinedStore`: a cache layer over a durable layer behind one `Store`

pub mod cached;
pub mod combined;
pub mod json;
pub mod locks;
mod pinned;

pub use cached::{CacheConfig, CachedStore};
pub use combined::CombinedStore;
pub use json::{JsonStore, StoreCounts};
