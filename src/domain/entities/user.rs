use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sex of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    #[default]
    NotSpecified,
    Male,
    Female,
}

/// Represents a registered user of the messaging service
///
/// The password hash is computed by the caller; storage only compares it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: Uuid,
    pub registration_date: DateTime<Utc>,
    pub login: String,
    pub password_hash: String,
    pub name: String,
    pub sex: Sex,
    pub birthday: NaiveDate,
}

impl User {
    pub fn new(uuid: Uuid, login: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            uuid,
            registration_date: Utc::now(),
            login: login.into(),
            password_hash: password_hash.into(),
            name: String::new(),
            sex: Sex::NotSpecified,
            birthday: NaiveDate::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = sex;
        self
    }

    pub fn with_birthday(mut self, birthday: NaiveDate) -> Self {
        self.birthday = birthday;
        self
    }

    pub fn with_registration_date(mut self, date: DateTime<Utc>) -> Self {
        self.registration_date = date;
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.login
        } else {
            &self.name
        }
    }
}

// Hand-written so the password hash never ends up in logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("uuid", &self.uuid)
            .field("registration_date", &self.registration_date)
            .field("login", &self.login)
            .field("password_hash", &"<redacted>")
            .field("name", &self.name)
            .field("sex", &self.sex)
            .field("birthday", &self.birthday)
            .finish()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Optional criteria for listing users. An empty filter matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub login_contains: Option<String>,
    pub name_contains: Option<String>,
    pub sex: Option<Sex>,
}

impl UserFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_contains(mut self, part: impl Into<String>) -> Self {
        self.login_contains = Some(part.into());
        self
    }

    pub fn name_contains(mut self, part: impl Into<String>) -> Self {
        self.name_contains = Some(part.into());
        self
    }

    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn matches(&self, user: &User) -> bool {
        if let Some(ref part) = self.login_contains {
            if !user.login.contains(part.as_str()) {
                return false;
            }
        }
        if let Some(ref part) = self.name_contains {
            if !user.name.contains(part.as_str()) {
                return false;
            }
        }
        match self.sex {
            Some(sex) => user.sex == sex,
            None => true,
        }
    }
}
