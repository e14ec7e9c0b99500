use std::fmt;

use chrono::{DateTime, Utc};

/// One platform identity this system can act as.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Invite link or public handle identifying a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupRef(pub String);

impl GroupRef {
    pub fn new(group: impl Into<String>) -> Self {
        Self(group.into())
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group member eligible to receive messages.
///
/// Immutable once produced by the roster fetcher; `last_seen` is unix
/// seconds of the most recent presence the platform exposed, if any.
#[derive(Clone, Debug)]
pub struct Recipient {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bot: bool,
    pub verified: bool,
    pub last_seen: Option<i64>,
    pub retrieved_at: DateTime<Utc>,
}
