//! Cache-over-durable composition

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use super::cached::{CacheConfig, CachedStore};
use crate::application::errors::{ErrorKind, StorageResult};
use crate::domain::entities::{Group, GroupMessage, MessageRange, User, UserFilter, UserList};
use crate::domain::traits::Store;
use crate::infrastructure::logging::Diagnostics;

/// Store that routes every call through a cache layer wired over a durable
/// layer. Errors come back exactly as the layers produced them.
pub struct CombinedStore {
    durable: Arc<dyn Store>,
    cache: Arc<dyn Store>,
    diagnostics: Diagnostics,
}

impl CombinedStore {
    pub fn new(durable: Arc<dyn Store>, config: &CacheConfig, diagnostics: Diagnostics) -> Self {
        let cache: Arc<dyn Store> = Arc::new(CachedStore::new(durable.clone(), config, diagnostics.clone()));
        Self::from_layers(durable, cache, diagnostics)
    }

    /// `cache` must already wrap `durable`.
    pub fn from_layers(durable: Arc<dyn Store>, cache: Arc<dyn Store>, diagnostics: Diagnostics) -> Self {
        Self {
            durable,
            cache,
            diagnostics: diagnostics.for_component("combined-store"),
        }
    }

    pub fn durable(&self) -> &Arc<dyn Store> {
        &self.durable
    }

    pub fn cache(&self) -> &Arc<dyn Store> {
        &self.cache
    }

    fn forward<T>(&self, operation: &str, result: StorageResult<T>) -> StorageResult<T> {
        if let Err(ref e) = result {
            match e.kind() {
                ErrorKind::IoFailure | ErrorKind::MalformedData => {
                    self.diagnostics.warn(format!("{} not applied durably: {}", operation, e))
                }
                _ => self.diagnostics.debug(format!("{} failed: {}", operation, e)),
            }
        }
        result
    }
}

#[async_trait]
impl Store for CombinedStore {
    async fn open(&self) -> StorageResult<()> {
        self.close().await;
        self.durable.open().await?;
        if let Err(e) = self.cache.open().await {
            self.diagnostics.error(format!("cache layer failed to open: {}", e));
            self.close().await;
            return Err(e);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.durable.is_open() && self.cache.is_open()
    }

    async fn close(&self) {
        self.cache.close().await;
        self.durable.close().await;
    }

    async fn add_user(&self, user: &User) -> StorageResult<()> {
        self.forward("add_user", self.cache.add_user(user).await)
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        self.forward("update_user", self.cache.update_user(user).await)
    }

    async fn get_user(&self, uuid: Uuid) -> StorageResult<User> {
        self.forward("get_user", self.cache.get_user(uuid).await)
    }

    async fn find_user_by_authentication(&self, login: &str, password_hash: &str) -> StorageResult<User> {
        self.forward(
            "find_user_by_authentication",
            self.cache.find_user_by_authentication(login, password_hash).await,
        )
    }

    async fn get_user_list(&self, filter: Option<&UserFilter>) -> StorageResult<UserList> {
        self.forward("get_user_list", self.cache.get_user_list(filter).await)
    }

    async fn remove_user(&self, uuid: Uuid) -> StorageResult<()> {
        self.forward("remove_user", self.cache.remove_user(uuid).await)
    }

    async fn set_user_contacts(&self, user: Uuid, contacts: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.forward("set_user_contacts", self.cache.set_user_contacts(user, contacts).await)
    }

    async fn add_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.forward("add_user_contact", self.cache.add_user_contact(user, contact).await)
    }

    async fn remove_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.forward("remove_user_contact", self.cache.remove_user_contact(user, contact).await)
    }

    async fn clear_user_contacts(&self, user: Uuid) -> StorageResult<()> {
        self.forward("clear_user_contacts", self.cache.clear_user_contacts(user).await)
    }

    async fn get_user_contact_list(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.forward("get_user_contact_list", self.cache.get_user_contact_list(user).await)
    }

    async fn get_user_groups(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.forward("get_user_groups", self.cache.get_user_groups(user).await)
    }

    async fn add_group(&self, group: &Group) -> StorageResult<()> {
        self.forward("add_group", self.cache.add_group(group).await)
    }

    async fn update_group(&self, group: &Group) -> StorageResult<()> {
        self.forward("update_group", self.cache.update_group(group).await)
    }

    async fn get_group(&self, uuid: Uuid) -> StorageResult<Group> {
        self.forward("get_group", self.cache.get_group(uuid).await)
    }

    async fn remove_group(&self, uuid: Uuid) -> StorageResult<()> {
        self.forward("remove_group", self.cache.remove_group(uuid).await)
    }

    async fn set_group_users(&self, group: Uuid, users: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.forward("set_group_users", self.cache.set_group_users(group, users).await)
    }

    async fn add_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.forward("add_group_user", self.cache.add_group_user(group, user).await)
    }

    async fn remove_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.forward("remove_group_user", self.cache.remove_group_user(group, user).await)
    }

    async fn clear_group_users(&self, group: Uuid) -> StorageResult<()> {
        self.forward("clear_group_users", self.cache.clear_group_users(group).await)
    }

    async fn get_group_user_list(&self, group: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.forward("get_group_user_list", self.cache.get_group_user_list(group).await)
    }

    async fn add_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.forward("add_group_message", self.cache.add_group_message(message).await)
    }

    async fn update_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.forward("update_group_message", self.cache.update_group_message(message).await)
    }

    async fn get_group_message(&self, uuid: Uuid) -> StorageResult<GroupMessage> {
        self.forward("get_group_message", self.cache.get_group_message(uuid).await)
    }

    async fn get_group_messages(&self, group: Uuid, range: &MessageRange) -> StorageResult<Vec<GroupMessage>> {
        self.forward("get_group_messages", self.cache.get_group_messages(group, range).await)
    }

    async fn remove_group_message(&self, message: Uuid, group: Uuid) -> StorageResult<()> {
        self.forward("remove_group_message", self.cache.remove_group_message(message, group).await)
    }
}
