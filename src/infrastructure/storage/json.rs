//! File-based storage implementation
//!
//! Every collection lives in its own JSON document inside the data
//! directory. The documents are loaded once on `open` and kept in memory;
//! each mutation rewrites the document of the collection it touched.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::application::errors::{Entity, StorageError, StorageResult};
use crate::domain::entities::{Group, GroupMessage, MessageRange, User, UserFilter, UserList};
use crate::domain::traits::Store;
use crate::infrastructure::logging::Diagnostics;

pub const USERS_DOCUMENT: &str = "users";
pub const GROUPS_DOCUMENT: &str = "groups";
pub const MESSAGES_DOCUMENT: &str = "messages";
pub const CONTACTS_DOCUMENT: &str = "contacts";

/// A user's contact relation as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub user: Uuid,
    pub contacts: BTreeSet<Uuid>,
}

/// Anything that can be kept in a document collection
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const ENTITY: Entity;

    fn key(&self) -> Uuid;
}

impl Record for User {
    const ENTITY: Entity = Entity::User;

    fn key(&self) -> Uuid {
        self.uuid
    }
}

impl Record for Group {
    const ENTITY: Entity = Entity::Group;

    fn key(&self) -> Uuid {
        self.uuid
    }
}

impl Record for GroupMessage {
    const ENTITY: Entity = Entity::Message;

    fn key(&self) -> Uuid {
        self.uuid
    }
}

impl Record for ContactRecord {
    const ENTITY: Entity = Entity::Contact;

    fn key(&self) -> Uuid {
        self.user
    }
}

/// One document: its in-memory records plus flush bookkeeping
struct Collection<T: Record> {
    name: &'static str,
    records: RwLock<BTreeMap<Uuid, T>>,
    generation: AtomicU64,
    flushed: Mutex<u64>,
}

impl<T: Record> Collection<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            records: RwLock::new(BTreeMap::new()),
            generation: AtomicU64::new(0),
            flushed: Mutex::new(0),
        }
    }

    fn path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.name))
    }

    /// Serialize the current records. Must be called while holding the
    /// write guard so generations follow mutation order.
    fn snapshot(&self, records: &BTreeMap<Uuid, T>) -> StorageResult<(u64, Vec<u8>)> {
        let values: Vec<&T> = records.values().collect();
        let bytes = serde_json::to_vec_pretty(&values)
            .map_err(|e| StorageError::malformed(T::ENTITY, e))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ok((generation, bytes))
    }

    /// Write a snapshot unless a newer one already reached the disk.
    async fn persist(&self, dir: &Path, generation: u64, bytes: Vec<u8>) -> StorageResult<()> {
        let mut flushed = self.flushed.lock().await;
        if *flushed >= generation {
            return Ok(());
        }

        let path = self.path(dir);
        let tmp = dir.join(format!("{}.json.tmp", self.name));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        *flushed = generation;
        Ok(())
    }

    async fn load(&self, dir: &Path, diagnostics: &Diagnostics) -> StorageResult<usize> {
        let path = self.path(dir);
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, b"[]").await?;
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let document: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| StorageError::malformed(T::ENTITY, format!("{}: {}", path.display(), e)))?;
        let items = match document {
            serde_json::Value::Array(items) => items,
            _ => {
                return Err(StorageError::malformed(
                    T::ENTITY,
                    format!("{}: expected an array", path.display()),
                ))
            }
        };

        let mut records = BTreeMap::new();
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<T>(item) {
                Ok(record) => {
                    let key = record.key();
                    if records.contains_key(&key) {
                        diagnostics.warn(format!("{} #{}: duplicate {} {}, skipped", self.name, index, T::ENTITY, key));
                        continue;
                    }
                    records.insert(key, record);
                }
                Err(e) => {
                    diagnostics.warn(format!("{} #{}: malformed {} record skipped: {}", self.name, index, T::ENTITY, e));
                }
            }
        }

        let count = records.len();
        *self.records.write().await = records;
        self.generation.store(0, Ordering::SeqCst);
        *self.flushed.lock().await = 0;
        Ok(count)
    }

    async fn clear(&self) {
        self.records.write().await.clear();
    }
}

/// Number of records held by each document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub users: usize,
    pub groups: usize,
    pub messages: usize,
    pub contact_lists: usize,
}

/// JSON file-based store
pub struct JsonStore {
    base_path: PathBuf,
    open: AtomicBool,
    users: Collection<User>,
    groups: Collection<Group>,
    messages: Collection<GroupMessage>,
    contacts: Collection<ContactRecord>,
    diagnostics: Diagnostics,
}

impl JsonStore {
    pub fn new(base_path: impl Into<PathBuf>, diagnostics: Diagnostics) -> Self {
        Self {
            base_path: base_path.into(),
            open: AtomicBool::new(false),
            users: Collection::new(USERS_DOCUMENT),
            groups: Collection::new(GROUPS_DOCUMENT),
            messages: Collection::new(MESSAGES_DOCUMENT),
            contacts: Collection::new(CONTACTS_DOCUMENT),
            diagnostics: diagnostics.for_component("json-store"),
        }
    }

    /// Record counts of every document, including groups without members
    pub async fn counts(&self) -> StorageResult<StoreCounts> {
        self.ensure_open()?;
        Ok(StoreCounts {
            users: self.users.records.read().await.len(),
            groups: self.groups.records.read().await.len(),
            messages: self.messages.records.read().await.len(),
            contact_lists: self.contacts.records.read().await.len(),
        })
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::NotOpen)
        }
    }

    async fn persist<T: Record>(&self, collection: &Collection<T>, generation: u64, bytes: Vec<u8>) -> StorageResult<()> {
        collection
            .persist(&self.base_path, generation, bytes)
            .await
            .map_err(|e| {
                self.diagnostics.error(format!("flush of {} failed: {}", collection.name, e));
                e
            })
    }

    fn check_users_exist<'a>(
        users: &BTreeMap<Uuid, User>,
        uuids: impl IntoIterator<Item = &'a Uuid>,
    ) -> StorageResult<()> {
        for uuid in uuids {
            if !users.contains_key(uuid) {
                return Err(StorageError::invalid_reference(Entity::User, uuid));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn open(&self) -> StorageResult<()> {
        self.close().await;
        tokio::fs::create_dir_all(&self.base_path).await?;

        let users = self.users.load(&self.base_path, &self.diagnostics).await?;
        let groups = self.groups.load(&self.base_path, &self.diagnostics).await?;
        let messages = self.messages.load(&self.base_path, &self.diagnostics).await?;
        let contacts = self.contacts.load(&self.base_path, &self.diagnostics).await?;

        self.open.store(true, Ordering::SeqCst);
        self.diagnostics.info(format!(
            "opened {}: {} users, {} groups, {} messages, {} contact lists",
            self.base_path.display(),
            users,
            groups,
            messages,
            contacts
        ));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.users.clear().await;
            self.groups.clear().await;
            self.messages.clear().await;
            self.contacts.clear().await;
            self.diagnostics.info(format!("closed {}", self.base_path.display()));
        }
    }

    async fn add_user(&self, user: &User) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut users = self.users.records.write().await;
            if users.contains_key(&user.uuid) {
                return Err(StorageError::already_exists(Entity::User, user.uuid));
            }
            if users.values().any(|u| u.login == user.login) {
                return Err(StorageError::already_exists(Entity::User, &user.login));
            }
            users.insert(user.uuid, user.clone());
            self.users.snapshot(&users)?
        };
        self.diagnostics.debug(format!("user {} added", user.uuid));
        self.persist(&self.users, generation, bytes).await
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut users = self.users.records.write().await;
            if !users.contains_key(&user.uuid) {
                return Err(StorageError::not_found(Entity::User, user.uuid));
            }
            if users.values().any(|u| u.login == user.login && u.uuid != user.uuid) {
                return Err(StorageError::already_exists(Entity::User, &user.login));
            }
            users.insert(user.uuid, user.clone());
            self.users.snapshot(&users)?
        };
        self.diagnostics.debug(format!("user {} updated", user.uuid));
        self.persist(&self.users, generation, bytes).await
    }

    async fn get_user(&self, uuid: Uuid) -> StorageResult<User> {
        self.ensure_open()?;
        self.users
            .records
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(|| StorageError::not_found(Entity::User, uuid))
    }

    async fn find_user_by_authentication(&self, login: &str, password_hash: &str) -> StorageResult<User> {
        self.ensure_open()?;
        let users = self.users.records.read().await;
        let user = users
            .values()
            .find(|u| u.login == login)
            .ok_or_else(|| StorageError::not_found(Entity::User, login))?;

        if user.password_hash != password_hash {
            return Err(StorageError::PasswordIncorrect(login.to_string()));
        }
        Ok(user.clone())
    }

    async fn get_user_list(&self, filter: Option<&UserFilter>) -> StorageResult<UserList> {
        self.ensure_open()?;
        let users = self.users.records.read().await;
        let mut matched: Vec<User> = users
            .values()
            .filter(|u| filter.map_or(true, |f| f.matches(u)))
            .cloned()
            .collect();
        matched.sort_by_key(|u| (u.registration_date, u.uuid));
        Ok(matched.into_iter().collect())
    }

    async fn remove_user(&self, uuid: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (users_snapshot, groups_snapshot, contacts_snapshot) = {
            let mut users = self.users.records.write().await;
            let mut groups = self.groups.records.write().await;
            let mut contacts = self.contacts.records.write().await;
            if users.remove(&uuid).is_none() {
                return Err(StorageError::not_found(Entity::User, uuid));
            }
            let users_snapshot = self.users.snapshot(&users)?;

            // A removed user is no longer a member anywhere.
            let mut left = 0;
            for group in groups.values_mut() {
                if group.members.remove(&uuid) {
                    left += 1;
                }
            }
            let groups_snapshot = match left {
                0 => None,
                _ => Some(self.groups.snapshot(&groups)?),
            };
            let contacts_snapshot = match contacts.remove(&uuid) {
                Some(_) => Some(self.contacts.snapshot(&contacts)?),
                None => None,
            };
            (users_snapshot, groups_snapshot, contacts_snapshot)
        };
        self.diagnostics.debug(format!("user {} removed", uuid));

        let (generation, bytes) = users_snapshot;
        self.persist(&self.users, generation, bytes).await?;
        if let Some((generation, bytes)) = groups_snapshot {
            self.persist(&self.groups, generation, bytes).await?;
        }
        if let Some((generation, bytes)) = contacts_snapshot {
            self.persist(&self.contacts, generation, bytes).await?;
        }
        Ok(())
    }

    async fn set_user_contacts(&self, user: Uuid, contacts: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            if !users.contains_key(&user) {
                return Err(StorageError::not_found(Entity::User, user));
            }
            Self::check_users_exist(&users, contacts)?;

            let mut records = self.contacts.records.write().await;
            records.insert(user, ContactRecord { user, contacts: contacts.clone() });
            self.contacts.snapshot(&records)?
        };
        self.persist(&self.contacts, generation, bytes).await
    }

    async fn add_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            if !users.contains_key(&user) {
                return Err(StorageError::not_found(Entity::User, user));
            }
            Self::check_users_exist(&users, [&contact])?;

            let mut records = self.contacts.records.write().await;
            let record = records
                .entry(user)
                .or_insert_with(|| ContactRecord { user, contacts: BTreeSet::new() });
            if !record.contacts.insert(contact) {
                return Err(StorageError::already_exists(Entity::Contact, contact));
            }
            self.contacts.snapshot(&records)?
        };
        self.persist(&self.contacts, generation, bytes).await
    }

    async fn remove_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            if !users.contains_key(&user) {
                return Err(StorageError::not_found(Entity::User, user));
            }

            let mut records = self.contacts.records.write().await;
            let removed = records
                .get_mut(&user)
                .map_or(false, |record| record.contacts.remove(&contact));
            if !removed {
                return Err(StorageError::not_found(Entity::Contact, contact));
            }
            self.contacts.snapshot(&records)?
        };
        self.persist(&self.contacts, generation, bytes).await
    }

    async fn clear_user_contacts(&self, user: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            if !users.contains_key(&user) {
                return Err(StorageError::not_found(Entity::User, user));
            }

            let mut records = self.contacts.records.write().await;
            if records.remove(&user).is_none() {
                return Ok(());
            }
            self.contacts.snapshot(&records)?
        };
        self.persist(&self.contacts, generation, bytes).await
    }

    async fn get_user_contact_list(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.ensure_open()?;
        let users = self.users.records.read().await;
        if !users.contains_key(&user) {
            return Err(StorageError::not_found(Entity::User, user));
        }
        let records = self.contacts.records.read().await;
        Ok(records.get(&user).map(|r| r.contacts.clone()).unwrap_or_default())
    }

    async fn get_user_groups(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.ensure_open()?;
        let users = self.users.records.read().await;
        if !users.contains_key(&user) {
            return Err(StorageError::not_found(Entity::User, user));
        }
        let groups = self.groups.records.read().await;
        Ok(groups
            .values()
            .filter(|g| g.has_member(&user))
            .map(|g| g.uuid)
            .collect())
    }

    async fn add_group(&self, group: &Group) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            let mut groups = self.groups.records.write().await;
            if groups.contains_key(&group.uuid) {
                return Err(StorageError::already_exists(Entity::Group, group.uuid));
            }
            Self::check_users_exist(&users, &group.members)?;
            groups.insert(group.uuid, group.clone());
            self.groups.snapshot(&groups)?
        };
        self.diagnostics.debug(format!("group {} added", group.uuid));
        self.persist(&self.groups, generation, bytes).await
    }

    async fn update_group(&self, group: &Group) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            let mut groups = self.groups.records.write().await;
            let existing = groups
                .get(&group.uuid)
                .ok_or_else(|| StorageError::not_found(Entity::Group, group.uuid))?;
            Self::check_users_exist(&users, group.members.difference(&existing.members))?;
            groups.insert(group.uuid, group.clone());
            self.groups.snapshot(&groups)?
        };
        self.diagnostics.debug(format!("group {} updated", group.uuid));
        self.persist(&self.groups, generation, bytes).await
    }

    async fn get_group(&self, uuid: Uuid) -> StorageResult<Group> {
        self.ensure_open()?;
        self.groups
            .records
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(|| StorageError::not_found(Entity::Group, uuid))
    }

    async fn remove_group(&self, uuid: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut groups = self.groups.records.write().await;
            if groups.remove(&uuid).is_none() {
                return Err(StorageError::not_found(Entity::Group, uuid));
            }
            self.groups.snapshot(&groups)?
        };
        // Messages of the group stay behind as history.
        self.diagnostics.debug(format!("group {} removed", uuid));
        self.persist(&self.groups, generation, bytes).await
    }

    async fn set_group_users(&self, group: Uuid, users: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let known = self.users.records.read().await;
            let mut groups = self.groups.records.write().await;
            let entry = groups
                .get_mut(&group)
                .ok_or_else(|| StorageError::not_found(Entity::Group, group))?;
            Self::check_users_exist(&known, users.difference(&entry.members))?;
            entry.members = users.clone();
            self.groups.snapshot(&groups)?
        };
        self.persist(&self.groups, generation, bytes).await
    }

    async fn add_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let known = self.users.records.read().await;
            let mut groups = self.groups.records.write().await;
            let entry = groups
                .get_mut(&group)
                .ok_or_else(|| StorageError::not_found(Entity::Group, group))?;
            Self::check_users_exist(&known, [&user])?;
            if !entry.members.insert(user) {
                return Err(StorageError::already_exists(Entity::Member, user));
            }
            self.groups.snapshot(&groups)?
        };
        self.persist(&self.groups, generation, bytes).await
    }

    async fn remove_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut groups = self.groups.records.write().await;
            let entry = groups
                .get_mut(&group)
                .ok_or_else(|| StorageError::not_found(Entity::Group, group))?;
            if !entry.members.remove(&user) {
                return Err(StorageError::not_found(Entity::Member, user));
            }
            self.groups.snapshot(&groups)?
        };
        self.persist(&self.groups, generation, bytes).await
    }

    async fn clear_group_users(&self, group: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut groups = self.groups.records.write().await;
            let entry = groups
                .get_mut(&group)
                .ok_or_else(|| StorageError::not_found(Entity::Group, group))?;
            entry.members.clear();
            self.groups.snapshot(&groups)?
        };
        self.persist(&self.groups, generation, bytes).await
    }

    async fn get_group_user_list(&self, group: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.ensure_open()?;
        self.groups
            .records
            .read()
            .await
            .get(&group)
            .map(|g| g.members.clone())
            .ok_or_else(|| StorageError::not_found(Entity::Group, group))
    }

    async fn add_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let users = self.users.records.read().await;
            let groups = self.groups.records.read().await;
            let mut messages = self.messages.records.write().await;
            if messages.contains_key(&message.uuid) {
                return Err(StorageError::already_exists(Entity::Message, message.uuid));
            }
            if !groups.contains_key(&message.group) {
                return Err(StorageError::invalid_reference(Entity::Group, message.group));
            }
            Self::check_users_exist(&users, [&message.sender])?;
            messages.insert(message.uuid, message.clone());
            self.messages.snapshot(&messages)?
        };
        self.diagnostics.debug(format!("message {} added to group {}", message.uuid, message.group));
        self.persist(&self.messages, generation, bytes).await
    }

    async fn update_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut messages = self.messages.records.write().await;
            let existing = messages
                .get(&message.uuid)
                .ok_or_else(|| StorageError::not_found(Entity::Message, message.uuid))?;
            if existing.group != message.group {
                return Err(StorageError::invalid_reference(Entity::Group, message.group));
            }
            messages.insert(message.uuid, message.clone());
            self.messages.snapshot(&messages)?
        };
        self.persist(&self.messages, generation, bytes).await
    }

    async fn get_group_message(&self, uuid: Uuid) -> StorageResult<GroupMessage> {
        self.ensure_open()?;
        self.messages
            .records
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(|| StorageError::not_found(Entity::Message, uuid))
    }

    async fn get_group_messages(&self, group: Uuid, range: &MessageRange) -> StorageResult<Vec<GroupMessage>> {
        self.ensure_open()?;
        let messages = self.messages.records.read().await;
        let mut found: Vec<GroupMessage> = messages
            .values()
            .filter(|m| m.group == group && range.contains(&m.created_at))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.order_key());
        Ok(found)
    }

    async fn remove_group_message(&self, message: Uuid, group: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let (generation, bytes) = {
            let mut messages = self.messages.records.write().await;
            let owned = messages.get(&message).map_or(false, |m| m.group == group);
            if !owned {
                return Err(StorageError::not_found(Entity::Message, message));
            }
            messages.remove(&message);
            self.messages.snapshot(&messages)?
        };
        self.persist(&self.messages, generation, bytes).await
    }
}
