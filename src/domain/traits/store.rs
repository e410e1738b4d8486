use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::errors::StorageResult;
use crate::domain::entities::{Group, GroupMessage, MessageRange, User, UserFilter, UserList};

/// Store trait - abstraction for data persistence
///
/// Implemented by the durable JSON store, the caching wrapper and the
/// combined store. All values are returned by copy; callers never hold
/// references into a store's internal state.
#[async_trait]
pub trait Store: Send + Sync {
    // Lifecycle
    async fn open(&self) -> StorageResult<()>;
    fn is_open(&self) -> bool;
    async fn close(&self);

    // User operations
    async fn add_user(&self, user: &User) -> StorageResult<()>;
    async fn update_user(&self, user: &User) -> StorageResult<()>;
    async fn get_user(&self, uuid: Uuid) -> StorageResult<User>;
    async fn find_user_by_authentication(&self, login: &str, password_hash: &str) -> StorageResult<User>;
    async fn get_user_list(&self, filter: Option<&UserFilter>) -> StorageResult<UserList>;
    async fn remove_user(&self, uuid: Uuid) -> StorageResult<()>;

    // Contact operations
    async fn set_user_contacts(&self, user: Uuid, contacts: &BTreeSet<Uuid>) -> StorageResult<()>;
    async fn add_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()>;
    async fn remove_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()>;
    async fn clear_user_contacts(&self, user: Uuid) -> StorageResult<()>;
    async fn get_user_contact_list(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>>;
    async fn get_user_groups(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>>;

    // Group operations
    async fn add_group(&self, group: &Group) -> StorageResult<()>;
    async fn update_group(&self, group: &Group) -> StorageResult<()>;
    async fn get_group(&self, uuid: Uuid) -> StorageResult<Group>;
    async fn remove_group(&self, uuid: Uuid) -> StorageResult<()>;
    async fn set_group_users(&self, group: Uuid, users: &BTreeSet<Uuid>) -> StorageResult<()>;
    async fn add_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()>;
    async fn remove_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()>;
    async fn clear_group_users(&self, group: Uuid) -> StorageResult<()>;
    async fn get_group_user_list(&self, group: Uuid) -> StorageResult<BTreeSet<Uuid>>;

    // Message operations
    async fn add_group_message(&self, message: &GroupMessage) -> StorageResult<()>;
    async fn update_group_message(&self, message: &GroupMessage) -> StorageResult<()>;
    async fn get_group_message(&self, uuid: Uuid) -> StorageResult<GroupMessage>;
    /// Messages of a group inside `range`, oldest first.
    async fn get_group_messages(&self, group: Uuid, range: &MessageRange) -> StorageResult<Vec<GroupMessage>>;
    async fn remove_group_message(&self, message: Uuid, group: Uuid) -> StorageResult<()>;
}
