//! Application layer errors

use std::fmt;
use thiserror::Error;

/// Kind of record a storage error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Group,
    Message,
    Contact,
    Member,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Group => "group",
            Entity::Message => "message",
            Entity::Contact => "contact",
            Entity::Member => "group member",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {entity} {key}")]
    NotFound { entity: Entity, key: String },

    #[error("Already exists: {entity} {key}")]
    AlreadyExists { entity: Entity, key: String },

    #[error("Malformed {entity} record: {reason}")]
    MalformedData { entity: Entity, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid reference: {entity} {key} does not exist")]
    InvalidReference { entity: Entity, key: String },

    #[error("Incorrect password for login {0}")]
    PasswordIncorrect(String),

    #[error("Storage is not open")]
    NotOpen,
}

/// Flat discriminant of [`StorageError`], handy for matching and for tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    MalformedData,
    IoFailure,
    InvalidReference,
    PasswordIncorrect,
    NotOpen,
}

impl StorageError {
    pub fn not_found(entity: Entity, key: impl ToString) -> Self {
        StorageError::NotFound { entity, key: key.to_string() }
    }

    pub fn already_exists(entity: Entity, key: impl ToString) -> Self {
        StorageError::AlreadyExists { entity, key: key.to_string() }
    }

    pub fn malformed(entity: Entity, reason: impl ToString) -> Self {
        StorageError::MalformedData { entity, reason: reason.to_string() }
    }

    pub fn invalid_reference(entity: Entity, key: impl ToString) -> Self {
        StorageError::InvalidReference { entity, key: key.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StorageError::MalformedData { .. } => ErrorKind::MalformedData,
            StorageError::Io(_) => ErrorKind::IoFailure,
            StorageError::InvalidReference { .. } => ErrorKind::InvalidReference,
            StorageError::PasswordIncorrect(_) => ErrorKind::PasswordIncorrect,
            StorageError::NotOpen => ErrorKind::NotOpen,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
