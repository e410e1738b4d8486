//! Shared helpers for the storage integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use uuid::Uuid;

use hawk_storage::{
    Diagnostics, Group, GroupMessage, JsonStore, MessageRange, StorageError, StorageResult, Store, User,
    UserFilter, UserList,
};

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub async fn open_json(dir: &std::path::Path) -> Arc<JsonStore> {
    let store = Arc::new(JsonStore::new(dir, Diagnostics::current()));
    store.open().await.expect("json store should open");
    store
}

pub fn user(login: &str) -> User {
    User::new(Uuid::new_v4(), login, format!("{}-hash", login))
}

fn injected() -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "injected failure"))
}

/// Wraps a store and fails reads or writes on demand, without touching the
/// wrapped store when it fails.
pub struct FaultyStore {
    inner: Arc<dyn Store>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of read calls that reached this layer
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn write(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(injected())
        } else {
            Ok(())
        }
    }

    fn read(&self) -> StorageResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(injected())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn open(&self) -> StorageResult<()> {
        self.inner.open().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn close(&self) {
        self.inner.close().await
    }

    async fn add_user(&self, user: &User) -> StorageResult<()> {
        self.write()?;
        self.inner.add_user(user).await
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        self.write()?;
        self.inner.update_user(user).await
    }

    async fn get_user(&self, uuid: Uuid) -> StorageResult<User> {
        self.read()?;
        self.inner.get_user(uuid).await
    }

    async fn find_user_by_authentication(&self, login: &str, password_hash: &str) -> StorageResult<User> {
        self.read()?;
        self.inner.find_user_by_authentication(login, password_hash).await
    }

    async fn get_user_list(&self, filter: Option<&UserFilter>) -> StorageResult<UserList> {
        self.read()?;
        self.inner.get_user_list(filter).await
    }

    async fn remove_user(&self, uuid: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.remove_user(uuid).await
    }

    async fn set_user_contacts(&self, user: Uuid, contacts: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.write()?;
        self.inner.set_user_contacts(user, contacts).await
    }

    async fn add_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.add_user_contact(user, contact).await
    }

    async fn remove_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.remove_user_contact(user, contact).await
    }

    async fn clear_user_contacts(&self, user: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.clear_user_contacts(user).await
    }

    async fn get_user_contact_list(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.read()?;
        self.inner.get_user_contact_list(user).await
    }

    async fn get_user_groups(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.read()?;
        self.inner.get_user_groups(user).await
    }

    async fn add_group(&self, group: &Group) -> StorageResult<()> {
        self.write()?;
        self.inner.add_group(group).await
    }

    async fn update_group(&self, group: &Group) -> StorageResult<()> {
        self.write()?;
        self.inner.update_group(group).await
    }

    async fn get_group(&self, uuid: Uuid) -> StorageResult<Group> {
        self.read()?;
        self.inner.get_group(uuid).await
    }

    async fn remove_group(&self, uuid: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.remove_group(uuid).await
    }

    async fn set_group_users(&self, group: Uuid, users: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.write()?;
        self.inner.set_group_users(group, users).await
    }

    async fn add_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.add_group_user(group, user).await
    }

    async fn remove_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.remove_group_user(group, user).await
    }

    async fn clear_group_users(&self, group: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.clear_group_users(group).await
    }

    async fn get_group_user_list(&self, group: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.read()?;
        self.inner.get_group_user_list(group).await
    }

    async fn add_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.write()?;
        self.inner.add_group_message(message).await
    }

    async fn update_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.write()?;
        self.inner.update_group_message(message).await
    }

    async fn get_group_message(&self, uuid: Uuid) -> StorageResult<GroupMessage> {
        self.read()?;
        self.inner.get_group_message(uuid).await
    }

    async fn get_group_messages(&self, group: Uuid, range: &MessageRange) -> StorageResult<Vec<GroupMessage>> {
        self.read()?;
        self.inner.get_group_messages(group, range).await
    }

    async fn remove_group_message(&self, message: Uuid, group: Uuid) -> StorageResult<()> {
        self.write()?;
        self.inner.remove_group_message(message, group).await
    }
}
