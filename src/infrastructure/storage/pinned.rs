//! Acknowledged state of keys whose write failed in a wrapped store

use dashmap::DashMap;
use uuid::Uuid;

/// Last acknowledged state per key, kept outside any evicting cache.
/// A pinned `None` means the key is known to be absent.
pub struct Pinned<V> {
    entries: DashMap<Uuid, Option<V>>,
}

impl<V: Clone> Pinned<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// `None` when the key is not pinned.
    pub fn get(&self, key: &Uuid) -> Option<Option<V>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn pin(&self, key: Uuid, state: Option<V>) {
        self.entries.insert(key, state);
    }

    pub fn release_all(&self) {
        if !self.entries.is_empty() {
            self.entries.clear();
        }
    }

    pub fn snapshot(&self) -> Vec<(Uuid, Option<V>)> {
        self.entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for Pinned<V> {
    fn default() -> Self {
        Self::new()
    }
}
