use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat group and the uuids of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: Uuid,
    pub registration_date: DateTime<Utc>,
    pub name: String,
    #[serde(rename = "users")]
    pub members: BTreeSet<Uuid>,
}

impl Group {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            registration_date: Utc::now(),
            name: name.into(),
            members: BTreeSet::new(),
        }
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = Uuid>) -> Self {
        self.members = members.into_iter().collect();
        self
    }

    pub fn with_registration_date(mut self, date: DateTime<Utc>) -> Self {
        self.registration_date = date;
        self
    }

    pub fn has_member(&self, user: &Uuid) -> bool {
        self.members.contains(user)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} members)", self.name, self.members.len())
    }
}
