use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of message content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Empty,
    Text,
    Image,
}

/// A message posted to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub uuid: Uuid,
    pub sender: Uuid,
    pub group: Uuid,
    pub kind: MessageKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl GroupMessage {
    pub fn new(uuid: Uuid, sender: Uuid, group: Uuid) -> Self {
        Self {
            uuid,
            sender,
            group,
            kind: MessageKind::Empty,
            body: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn text(uuid: Uuid, sender: Uuid, group: Uuid, body: impl Into<String>) -> Self {
        Self::new(uuid, sender, group).with_body(MessageKind::Text, body)
    }

    pub fn with_body(mut self, kind: MessageKind, body: impl Into<String>) -> Self {
        self.kind = kind;
        self.body = body.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Chronological ordering key within a group
    pub fn order_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.uuid)
    }
}

/// Inclusive time window for message lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl MessageRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn all() -> Self {
        Self {
            from: DateTime::<Utc>::MIN_UTC,
            to: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.from && *at <= self.to
    }
}
