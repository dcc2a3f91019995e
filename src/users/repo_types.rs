use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::password::Credential;

/// User aggregate. The credential and version never leave the process in
/// serialized form.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,                   // nil until inserted
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime, // set by the store
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub credential: Credential,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32, // optimistic concurrency token
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_nil()
    }
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            name: String::new(),
            email: String::new(),
            credential: Credential::default(),
            activated: false,
            version: 0,
        }
    }
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            created_at: r.created_at,
            name: r.name,
            email: r.email,
            credential: Credential::from_hash(r.password_hash),
            activated: r.activated,
            version: r.version,
        }
    }
}

/// Who is behind a request.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity::Authenticated(user)
    }
}
