use uuid::Uuid;

use super::User;
use crate::application::errors::{Entity, StorageError, StorageResult};

/// Ordered list of users, addressable by position or by uuid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserList {
    users: Vec<User>,
}

impl UserList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.users.iter().any(|u| u.uuid == *uuid)
    }

    /// Append a user; a uuid already in the list is rejected.
    pub fn add(&mut self, user: User) -> StorageResult<()> {
        if self.contains(&user.uuid) {
            return Err(StorageError::already_exists(Entity::User, user.uuid));
        }
        self.users.push(user);
        Ok(())
    }

    pub fn get(&self, index: usize) -> StorageResult<&User> {
        self.users
            .get(index)
            .ok_or_else(|| StorageError::not_found(Entity::User, format!("#{}", index)))
    }

    pub fn find(&self, uuid: &Uuid) -> StorageResult<&User> {
        self.users
            .iter()
            .find(|u| u.uuid == *uuid)
            .ok_or_else(|| StorageError::not_found(Entity::User, uuid))
    }

    pub fn remove(&mut self, index: usize) -> StorageResult<User> {
        if index >= self.users.len() {
            return Err(StorageError::not_found(Entity::User, format!("#{}", index)));
        }
        Ok(self.users.remove(index))
    }

    pub fn remove_by_uuid(&mut self, uuid: &Uuid) -> StorageResult<User> {
        match self.users.iter().position(|u| u.uuid == *uuid) {
            Some(index) => Ok(self.users.remove(index)),
            None => Err(StorageError::not_found(Entity::User, uuid)),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, User> {
        self.users.iter()
    }

    pub fn uuids(&self) -> Vec<Uuid> {
        self.users.iter().map(|u| u.uuid).collect()
    }
}

impl IntoIterator for UserList {
    type Item = User;
    type IntoIter = std::vec::IntoIter<User>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.into_iter()
    }
}

impl<'a> IntoIterator for &'a UserList {
    type Item = &'a User;
    type IntoIter = std::slice::Iter<'a, User>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.iter()
    }
}

impl FromIterator<User> for UserList {
    /// Later duplicates of a uuid are dropped.
    fn from_iter<I: IntoIterator<Item = User>>(iter: I) -> Self {
        let mut list = UserList::new();
        for user in iter {
            let _ = list.add(user);
        }
        list
    }
}
