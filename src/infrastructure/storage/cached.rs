//! Caching store wrapper
//!
//! Reads go to the cache first and fall back to the wrapped store on a miss.
//! Writes are applied to the wrapped store first; the cache is only touched
//! after the wrapped store has accepted the change.
//!
//! A write that fails with an I/O error may still have changed the wrapped
//! store's memory. The state from before such a write is pinned for that key
//! and served instead of the wrapped store's view, until the next successful
//! write to the same collection acknowledges the wrapped store's state.

use async_trait::async_trait;
use moka::future::Cache;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::locks::KeyLocks;
use super::pinned::Pinned;
use crate::application::errors::{Entity, ErrorKind, StorageError, StorageResult};
use crate::domain::entities::{Group, GroupMessage, MessageRange, User, UserFilter, UserList};
use crate::domain::traits::Store;
use crate::infrastructure::logging::Diagnostics;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries per cached collection
    pub max_capacity: u64,
    pub time_to_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_idle: Some(Duration::from_secs(600)),
        }
    }
}

impl CacheConfig {
    fn build<V: Clone + Send + Sync + 'static>(&self) -> Cache<Uuid, V> {
        let mut builder = Cache::builder().max_capacity(self.max_capacity);
        if let Some(idle) = self.time_to_idle {
            builder = builder.time_to_idle(idle);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    User(Uuid),
    Group(Uuid),
    Message(Uuid),
    Contacts(Uuid),
    UserGroups(Uuid),
}

/// State of a key before a write; `None` when it could not be read.
type Before<V> = Option<Option<V>>;

/// Store wrapper with bounded read-through / write-through caches
pub struct CachedStore {
    inner: Arc<dyn Store>,
    open: AtomicBool,
    users: Cache<Uuid, User>,
    groups: Cache<Uuid, Group>,
    messages: Cache<Uuid, GroupMessage>,
    contacts: Cache<Uuid, BTreeSet<Uuid>>,
    user_groups: Cache<Uuid, BTreeSet<Uuid>>,
    pinned_users: Pinned<User>,
    pinned_groups: Pinned<Group>,
    pinned_messages: Pinned<GroupMessage>,
    pinned_contacts: Pinned<BTreeSet<Uuid>>,
    locks: KeyLocks<CacheKey>,
    diagnostics: Diagnostics,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn Store>, config: &CacheConfig, diagnostics: Diagnostics) -> Self {
        Self {
            inner,
            open: AtomicBool::new(false),
            users: config.build(),
            groups: config.build(),
            messages: config.build(),
            contacts: config.build(),
            user_groups: config.build(),
            pinned_users: Pinned::new(),
            pinned_groups: Pinned::new(),
            pinned_messages: Pinned::new(),
            pinned_contacts: Pinned::new(),
            locks: KeyLocks::new(),
            diagnostics: diagnostics.for_component("cache-store"),
        }
    }

    /// Drop every cached entry. Pinned states are kept.
    pub fn invalidate_all(&self) {
        self.users.invalidate_all();
        self.groups.invalidate_all();
        self.messages.invalidate_all();
        self.contacts.invalidate_all();
        self.user_groups.invalidate_all();
    }

    /// Total number of cached entries across all collections
    pub async fn entry_count(&self) -> u64 {
        self.users.run_pending_tasks().await;
        self.groups.run_pending_tasks().await;
        self.messages.run_pending_tasks().await;
        self.contacts.run_pending_tasks().await;
        self.user_groups.run_pending_tasks().await;

        self.users.entry_count()
            + self.groups.entry_count()
            + self.messages.entry_count()
            + self.contacts.entry_count()
            + self.user_groups.entry_count()
    }

    fn release_pins(&self) {
        self.pinned_users.release_all();
        self.pinned_groups.release_all();
        self.pinned_messages.release_all();
        self.pinned_contacts.release_all();
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::NotOpen)
        }
    }

    /// Pinned state, then cached entry, then the wrapped store.
    async fn read_through<V, F, Fut>(
        &self,
        pins: &Pinned<V>,
        cache: &Cache<Uuid, V>,
        lock: CacheKey,
        key: Uuid,
        entity: Entity,
        fetch: F,
    ) -> StorageResult<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<V>>,
    {
        if let Some(state) = pins.get(&key) {
            return state.ok_or_else(|| StorageError::not_found(entity, key));
        }
        if let Some(value) = cache.get(&key).await {
            return Ok(value);
        }

        let _guard = self.locks.lock(lock).await;
        if let Some(state) = pins.get(&key) {
            return state.ok_or_else(|| StorageError::not_found(entity, key));
        }
        if let Some(value) = cache.get(&key).await {
            return Ok(value);
        }
        let value = fetch().await?;
        cache.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Apply the outcome of a write to one collection. Success acknowledges
    /// the wrapped store's state; an I/O failure pins `before` for `key`.
    async fn settle<V>(
        &self,
        pins: &Pinned<V>,
        cache: &Cache<Uuid, V>,
        key: Uuid,
        before: Before<V>,
        result: &StorageResult<()>,
    ) where
        V: Clone + Send + Sync + 'static,
    {
        match result {
            Ok(()) => pins.release_all(),
            Err(e) if e.kind() == ErrorKind::IoFailure => {
                match before {
                    Some(state) => pins.pin(key, state),
                    None => self
                        .diagnostics
                        .warn(format!("state of {} before failed write is unknown, not pinned", key)),
                }
                cache.invalidate(&key).await;
            }
            Err(_) => {}
        }
    }

    async fn peek_user(&self, uuid: Uuid) -> Before<User> {
        peek(&self.pinned_users, &self.users, uuid, || self.inner.get_user(uuid)).await
    }

    async fn peek_group(&self, uuid: Uuid) -> Before<Group> {
        peek(&self.pinned_groups, &self.groups, uuid, || self.inner.get_group(uuid)).await
    }

    async fn peek_message(&self, uuid: Uuid) -> Before<GroupMessage> {
        peek(&self.pinned_messages, &self.messages, uuid, || self.inner.get_group_message(uuid)).await
    }

    async fn peek_contacts(&self, user: Uuid) -> Before<BTreeSet<Uuid>> {
        peek(&self.pinned_contacts, &self.contacts, user, || self.inner.get_user_contact_list(user)).await
    }

    /// Groups of a user as the wrapped store reports them, corrected by the
    /// pinned group states. Never cached.
    async fn derive_user_groups(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        let mut groups = match self.inner.get_user_groups(user).await {
            Ok(groups) => groups,
            Err(e) if e.is_not_found() && matches!(self.pinned_users.get(&user), Some(Some(_))) => BTreeSet::new(),
            Err(e) => return Err(e),
        };
        for (uuid, state) in self.pinned_groups.snapshot() {
            match state {
                Some(group) if group.has_member(&user) => {
                    groups.insert(uuid);
                }
                _ => {
                    groups.remove(&uuid);
                }
            }
        }
        Ok(groups)
    }

    async fn invalidate_user_groups(&self, users: Option<BTreeSet<Uuid>>) {
        match users {
            Some(users) => {
                for user in users {
                    let _guard = self.locks.lock(CacheKey::UserGroups(user)).await;
                    self.user_groups.invalidate(&user).await;
                }
            }
            None => self.user_groups.invalidate_all(),
        }
    }

    /// Membership views of `affected` users after a group write that
    /// succeeded or may have reached the wrapped store.
    async fn membership_changed(&self, result: &StorageResult<()>, affected: Option<BTreeSet<Uuid>>) {
        if result.is_ok() || failed_io(result) {
            self.invalidate_user_groups(affected).await;
        }
    }

    async fn invalidate_user(&self, user: Uuid) {
        {
            let _guard = self.locks.lock(CacheKey::Contacts(user)).await;
            self.contacts.invalidate(&user).await;
        }
        let _guard = self.locks.lock(CacheKey::UserGroups(user)).await;
        self.user_groups.invalidate(&user).await;
    }
}

async fn peek<V, F, Fut>(pins: &Pinned<V>, cache: &Cache<Uuid, V>, key: Uuid, fetch: F) -> Before<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = StorageResult<V>>,
{
    if let Some(state) = pins.get(&key) {
        return Some(state);
    }
    if let Some(value) = cache.get(&key).await {
        return Some(Some(value));
    }
    match fetch().await {
        Ok(value) => Some(Some(value)),
        Err(e) if e.is_not_found() => Some(None),
        Err(_) => None,
    }
}

fn failed_io<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(e) if e.kind() == ErrorKind::IoFailure)
}

fn members_of(before: &Before<Group>) -> Option<BTreeSet<Uuid>> {
    before
        .as_ref()
        .map(|state| state.as_ref().map(|g| g.members.clone()).unwrap_or_default())
}

fn union(before: Option<BTreeSet<Uuid>>, after: &BTreeSet<Uuid>) -> Option<BTreeSet<Uuid>> {
    before.map(|mut set| {
        set.extend(after.iter().copied());
        set
    })
}

#[async_trait]
impl Store for CachedStore {
    async fn open(&self) -> StorageResult<()> {
        if !self.inner.is_open() {
            self.inner.open().await?;
        }
        self.invalidate_all();
        self.release_pins();
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.inner.is_open()
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.invalidate_all();
        self.release_pins();
        self.inner.close().await;
    }

    async fn add_user(&self, user: &User) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::User(user.uuid)).await;
        let before = Some(self.pinned_users.get(&user.uuid).flatten());
        let result = self.inner.add_user(user).await;
        self.settle(&self.pinned_users, &self.users, user.uuid, before, &result).await;
        if result.is_ok() {
            self.users.insert(user.uuid, user.clone()).await;
        }
        result
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::User(user.uuid)).await;
        let before = self.peek_user(user.uuid).await;
        let result = self.inner.update_user(user).await;
        self.settle(&self.pinned_users, &self.users, user.uuid, before, &result).await;
        if result.is_ok() {
            self.users.insert(user.uuid, user.clone()).await;
        }
        result
    }

    async fn get_user(&self, uuid: Uuid) -> StorageResult<User> {
        self.ensure_open()?;
        self.read_through(&self.pinned_users, &self.users, CacheKey::User(uuid), uuid, Entity::User, || {
            self.inner.get_user(uuid)
        })
        .await
    }

    async fn find_user_by_authentication(&self, login: &str, password_hash: &str) -> StorageResult<User> {
        self.ensure_open()?;
        if self.pinned_users.is_empty() {
            return self.inner.find_user_by_authentication(login, password_hash).await;
        }

        let pins = self.pinned_users.snapshot();
        if let Some(user) = pins.iter().filter_map(|(_, state)| state.as_ref()).find(|u| u.login == login) {
            if user.password_hash != password_hash {
                return Err(StorageError::PasswordIncorrect(login.to_string()));
            }
            return Ok(user.clone());
        }
        let found = self.inner.find_user_by_authentication(login, password_hash).await?;
        if pins.iter().any(|(uuid, _)| *uuid == found.uuid) {
            return Err(StorageError::not_found(Entity::User, login));
        }
        Ok(found)
    }

    async fn get_user_list(&self, filter: Option<&UserFilter>) -> StorageResult<UserList> {
        self.ensure_open()?;
        let list = self.inner.get_user_list(filter).await?;
        if self.pinned_users.is_empty() {
            return Ok(list);
        }

        let pins: BTreeMap<Uuid, Option<User>> = self.pinned_users.snapshot().into_iter().collect();
        let mut users: Vec<User> = list.into_iter().filter(|u| !pins.contains_key(&u.uuid)).collect();
        users.extend(
            pins.into_values()
                .flatten()
                .filter(|u| filter.map_or(true, |f| f.matches(u))),
        );
        users.sort_by_key(|u| (u.registration_date, u.uuid));
        Ok(users.into_iter().collect())
    }

    async fn remove_user(&self, uuid: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::User(uuid)).await;
        let before = self.peek_user(uuid).await;
        let before_contacts = self.peek_contacts(uuid).await;

        // The user's memberships are dropped along with it.
        let joined = self.derive_user_groups(uuid).await.unwrap_or_default();
        let mut group_guards = Vec::with_capacity(joined.len());
        let mut before_groups = Vec::with_capacity(joined.len());
        for group in &joined {
            group_guards.push(self.locks.lock(CacheKey::Group(*group)).await);
            before_groups.push((*group, self.peek_group(*group).await));
        }

        let result = self.inner.remove_user(uuid).await;
        self.settle(&self.pinned_users, &self.users, uuid, before, &result).await;
        self.settle(&self.pinned_contacts, &self.contacts, uuid, before_contacts, &result).await;
        for (group, before) in before_groups {
            self.settle(&self.pinned_groups, &self.groups, group, before, &result).await;
        }

        if result.is_ok() {
            self.users.invalidate(&uuid).await;
            let mut stale: BTreeSet<Uuid> = self
                .groups
                .iter()
                .filter(|(_, group)| group.has_member(&uuid))
                .map(|(key, _)| *key)
                .collect();
            stale.extend(joined.iter().copied());
            for group in stale {
                self.groups.invalidate(&group).await;
            }
        }
        drop(group_guards);

        if result.is_ok() || failed_io(&result) {
            self.invalidate_user(uuid).await;
        }
        result
    }

    async fn set_user_contacts(&self, user: Uuid, contacts: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Contacts(user)).await;
        let before = self.peek_contacts(user).await;
        let result = self.inner.set_user_contacts(user, contacts).await;
        self.settle(&self.pinned_contacts, &self.contacts, user, before, &result).await;
        if result.is_ok() {
            self.contacts.insert(user, contacts.clone()).await;
        }
        result
    }

    async fn add_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Contacts(user)).await;
        let before = self.peek_contacts(user).await;
        let result = self.inner.add_user_contact(user, contact).await;
        self.settle(&self.pinned_contacts, &self.contacts, user, before, &result).await;
        if result.is_ok() {
            self.contacts.invalidate(&user).await;
        }
        result
    }

    async fn remove_user_contact(&self, user: Uuid, contact: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Contacts(user)).await;
        let before = self.peek_contacts(user).await;
        let result = self.inner.remove_user_contact(user, contact).await;
        self.settle(&self.pinned_contacts, &self.contacts, user, before, &result).await;
        if result.is_ok() {
            self.contacts.invalidate(&user).await;
        }
        result
    }

    async fn clear_user_contacts(&self, user: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Contacts(user)).await;
        let before = self.peek_contacts(user).await;
        let result = self.inner.clear_user_contacts(user).await;
        self.settle(&self.pinned_contacts, &self.contacts, user, before, &result).await;
        if result.is_ok() {
            self.contacts.insert(user, BTreeSet::new()).await;
        }
        result
    }

    async fn get_user_contact_list(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.ensure_open()?;
        if let Some(None) = self.pinned_users.get(&user) {
            return Err(StorageError::not_found(Entity::User, user));
        }
        self.read_through(
            &self.pinned_contacts,
            &self.contacts,
            CacheKey::Contacts(user),
            user,
            Entity::User,
            || self.inner.get_user_contact_list(user),
        )
        .await
    }

    async fn get_user_groups(&self, user: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        self.ensure_open()?;
        match self.pinned_users.get(&user) {
            Some(None) => return Err(StorageError::not_found(Entity::User, user)),
            Some(Some(_)) => return self.derive_user_groups(user).await,
            None => {}
        }
        if !self.pinned_groups.is_empty() {
            return self.derive_user_groups(user).await;
        }
        if let Some(groups) = self.user_groups.get(&user).await {
            return Ok(groups);
        }

        let _guard = self.locks.lock(CacheKey::UserGroups(user)).await;
        if !self.pinned_groups.is_empty() {
            return self.derive_user_groups(user).await;
        }
        if let Some(groups) = self.user_groups.get(&user).await {
            return Ok(groups);
        }
        let groups = self.inner.get_user_groups(user).await?;
        self.user_groups.insert(user, groups.clone()).await;
        Ok(groups)
    }

    async fn add_group(&self, group: &Group) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(group.uuid)).await;
        let before = Some(self.pinned_groups.get(&group.uuid).flatten());
        let affected = union(members_of(&before), &group.members);
        let result = self.inner.add_group(group).await;
        self.settle(&self.pinned_groups, &self.groups, group.uuid, before, &result).await;
        if result.is_ok() {
            self.groups.insert(group.uuid, group.clone()).await;
        }
        self.membership_changed(&result, affected).await;
        result
    }

    async fn update_group(&self, group: &Group) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(group.uuid)).await;
        let before = self.peek_group(group.uuid).await;
        let affected = union(members_of(&before), &group.members);
        let result = self.inner.update_group(group).await;
        self.settle(&self.pinned_groups, &self.groups, group.uuid, before, &result).await;
        if result.is_ok() {
            self.groups.insert(group.uuid, group.clone()).await;
        }
        self.membership_changed(&result, affected).await;
        result
    }

    async fn get_group(&self, uuid: Uuid) -> StorageResult<Group> {
        self.ensure_open()?;
        self.read_through(&self.pinned_groups, &self.groups, CacheKey::Group(uuid), uuid, Entity::Group, || {
            self.inner.get_group(uuid)
        })
        .await
    }

    async fn remove_group(&self, uuid: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(uuid)).await;
        let before = self.peek_group(uuid).await;
        let affected = members_of(&before);
        let result = self.inner.remove_group(uuid).await;
        self.settle(&self.pinned_groups, &self.groups, uuid, before, &result).await;
        if result.is_ok() {
            self.groups.invalidate(&uuid).await;
        }
        self.membership_changed(&result, affected).await;
        result
    }

    async fn set_group_users(&self, group: Uuid, users: &BTreeSet<Uuid>) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(group)).await;
        let before = self.peek_group(group).await;
        let affected = union(members_of(&before), users);
        let result = self.inner.set_group_users(group, users).await;
        self.settle(&self.pinned_groups, &self.groups, group, before, &result).await;
        if result.is_ok() {
            self.groups.invalidate(&group).await;
        }
        self.membership_changed(&result, affected).await;
        result
    }

    async fn add_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(group)).await;
        let before = self.peek_group(group).await;
        let result = self.inner.add_group_user(group, user).await;
        self.settle(&self.pinned_groups, &self.groups, group, before, &result).await;
        if result.is_ok() {
            self.groups.invalidate(&group).await;
        }
        self.membership_changed(&result, Some(BTreeSet::from([user]))).await;
        result
    }

    async fn remove_group_user(&self, group: Uuid, user: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(group)).await;
        let before = self.peek_group(group).await;
        let result = self.inner.remove_group_user(group, user).await;
        self.settle(&self.pinned_groups, &self.groups, group, before, &result).await;
        if result.is_ok() {
            self.groups.invalidate(&group).await;
        }
        self.membership_changed(&result, Some(BTreeSet::from([user]))).await;
        result
    }

    async fn clear_group_users(&self, group: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Group(group)).await;
        let before = self.peek_group(group).await;
        let affected = members_of(&before);
        let result = self.inner.clear_group_users(group).await;
        self.settle(&self.pinned_groups, &self.groups, group, before, &result).await;
        if result.is_ok() {
            self.groups.invalidate(&group).await;
        }
        self.membership_changed(&result, affected).await;
        result
    }

    async fn get_group_user_list(&self, group: Uuid) -> StorageResult<BTreeSet<Uuid>> {
        Ok(self.get_group(group).await?.members)
    }

    async fn add_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Message(message.uuid)).await;
        let before = Some(self.pinned_messages.get(&message.uuid).flatten());
        let result = self.inner.add_group_message(message).await;
        self.settle(&self.pinned_messages, &self.messages, message.uuid, before, &result).await;
        if result.is_ok() {
            self.messages.insert(message.uuid, message.clone()).await;
        }
        result
    }

    async fn update_group_message(&self, message: &GroupMessage) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Message(message.uuid)).await;
        let before = self.peek_message(message.uuid).await;
        let result = self.inner.update_group_message(message).await;
        self.settle(&self.pinned_messages, &self.messages, message.uuid, before, &result).await;
        if result.is_ok() {
            self.messages.insert(message.uuid, message.clone()).await;
        }
        result
    }

    async fn get_group_message(&self, uuid: Uuid) -> StorageResult<GroupMessage> {
        self.ensure_open()?;
        self.read_through(
            &self.pinned_messages,
            &self.messages,
            CacheKey::Message(uuid),
            uuid,
            Entity::Message,
            || self.inner.get_group_message(uuid),
        )
        .await
    }

    async fn get_group_messages(&self, group: Uuid, range: &MessageRange) -> StorageResult<Vec<GroupMessage>> {
        self.ensure_open()?;
        let found = self.inner.get_group_messages(group, range).await?;
        if self.pinned_messages.is_empty() {
            return Ok(found);
        }

        let pins: BTreeMap<Uuid, Option<GroupMessage>> = self.pinned_messages.snapshot().into_iter().collect();
        let mut messages: Vec<GroupMessage> = found.into_iter().filter(|m| !pins.contains_key(&m.uuid)).collect();
        messages.extend(
            pins.into_values()
                .flatten()
                .filter(|m| m.group == group && range.contains(&m.created_at)),
        );
        messages.sort_by_key(|m| m.order_key());
        Ok(messages)
    }

    async fn remove_group_message(&self, message: Uuid, group: Uuid) -> StorageResult<()> {
        self.ensure_open()?;
        let _guard = self.locks.lock(CacheKey::Message(message)).await;
        let before = self.peek_message(message).await;
        let result = self.inner.remove_group_message(message, group).await;
        self.settle(&self.pinned_messages, &self.messages, message, before, &result).await;
        if result.is_ok() {
            self.messages.invalidate(&message).await;
        }
        result
    }
}
