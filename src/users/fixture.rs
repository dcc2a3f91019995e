//! Deterministic stand-in for [`UserStore`], used to drive callers through
//! every branch of the store's error taxonomy without a database.
//!
//! Each operation has a default outcome; individual emails and tokens can be
//! pinned to a different outcome with [`FixtureUserStore::with_email`] and
//! [`FixtureUserStore::with_token`]. Keys are matched exactly.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::errors::{FailureKind, HashingError, StoreError};
use crate::users::password::Credential;
use crate::users::repo::UserStore;
use crate::users::repo_types::User;
use crate::users::tokens::TokenScope;

/// Password that matches the credential of every user the fixture returns.
pub const FIXTURE_PASSWORD: &str = "fixture-pa55word";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateEmail,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Found,
    NotFound,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    DuplicateEmail,
    EditConflict,
    Failed(FailureKind),
}

/// Ready-made configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Every call succeeds.
    HappyPath,
    /// Every call fails with `Backend(Unavailable)`.
    StoreDown,
    /// Reads succeed, updates lose the version race.
    StaleEdit,
    /// Inserts and updates hit the unique email constraint.
    EmailTaken,
    /// Inserts succeed, lookups find nothing.
    UnknownAccount,
}

#[derive(Debug, Clone)]
pub struct FixtureUserStore {
    insert: InsertOutcome,
    fetch_by_email: FetchOutcome,
    fetch_for_token: FetchOutcome,
    update: UpdateOutcome,
    emails: HashMap<String, FetchOutcome>,
    tokens: HashMap<(TokenScope, String), FetchOutcome>,
    canned: User,
}

impl FixtureUserStore {
    /// Builds a store for `scenario`. Hashes [`FIXTURE_PASSWORD`] once.
    pub fn new(scenario: Scenario) -> Result<Self, HashingError> {
        let mut credential = Credential::default();
        credential.set_secret(FIXTURE_PASSWORD)?;
        let canned = User {
            id: Uuid::from_u128(1),
            created_at: OffsetDateTime::now_utc(),
            name: "Fixture User".into(),
            email: "fixture@example.com".into(),
            credential,
            activated: true,
            version: 1,
        };

        let down = FailureKind::Unavailable;
        let (insert, fetch, update) = match scenario {
            Scenario::HappyPath => (InsertOutcome::Inserted, FetchOutcome::Found, UpdateOutcome::Updated),
            Scenario::StoreDown => (
                InsertOutcome::Failed(down),
                FetchOutcome::Failed(down),
                UpdateOutcome::Failed(down),
            ),
            Scenario::StaleEdit => (InsertOutcome::Inserted, FetchOutcome::Found, UpdateOutcome::EditConflict),
            Scenario::EmailTaken => (
                InsertOutcome::DuplicateEmail,
                FetchOutcome::Found,
                UpdateOutcome::DuplicateEmail,
            ),
            Scenario::UnknownAccount => (InsertOutcome::Inserted, FetchOutcome::NotFound, UpdateOutcome::Updated),
        };

        Ok(Self {
            insert,
            fetch_by_email: fetch,
            fetch_for_token: fetch,
            update,
            emails: HashMap::new(),
            tokens: HashMap::new(),
            canned,
        })
    }

    pub fn on_insert(mut self, outcome: InsertOutcome) -> Self {
        self.insert = outcome;
        self
    }

    pub fn on_get_by_email(mut self, outcome: FetchOutcome) -> Self {
        self.fetch_by_email = outcome;
        self
    }

    pub fn on_get_for_token(mut self, outcome: FetchOutcome) -> Self {
        self.fetch_for_token = outcome;
        self
    }

    pub fn on_update(mut self, outcome: UpdateOutcome) -> Self {
        self.update = outcome;
        self
    }

    /// Pins `get_by_email(email)` to `outcome`.
    pub fn with_email(mut self, email: impl Into<String>, outcome: FetchOutcome) -> Self {
        self.emails.insert(email.into(), outcome);
        self
    }

    /// Pins `get_for_token(scope, token)` to `outcome`.
    pub fn with_token(
        mut self,
        scope: TokenScope,
        token: impl Into<String>,
        outcome: FetchOutcome,
    ) -> Self {
        self.tokens.insert((scope, token.into()), outcome);
        self
    }

    /// Replaces the user returned by successful lookups. Its credential is
    /// kept only if set; otherwise the fixture credential is reused.
    pub fn with_user(mut self, mut user: User) -> Self {
        if !user.credential.is_set() {
            user.credential = self.canned.credential.clone();
        }
        self.canned = user;
        self
    }

    pub fn canned_user(&self) -> &User {
        &self.canned
    }

    fn fetch(&self, outcome: FetchOutcome) -> Result<User, StoreError> {
        match outcome {
            FetchOutcome::Found => Ok(self.canned.clone()),
            FetchOutcome::NotFound => Err(StoreError::NotFound),
            FetchOutcome::Failed(kind) => Err(StoreError::Backend(kind)),
        }
    }
}

#[async_trait]
impl UserStore for FixtureUserStore {
    async fn insert(&self, user: &mut User) -> Result<(), StoreError> {
        assert!(user.credential.is_set(), "missing password hash for user");
        match self.insert {
            InsertOutcome::Inserted => {
                user.id = Uuid::new_v4();
                user.created_at = OffsetDateTime::now_utc();
                user.version = 1;
                Ok(())
            }
            InsertOutcome::DuplicateEmail => Err(StoreError::DuplicateEmail),
            InsertOutcome::Failed(kind) => Err(StoreError::Backend(kind)),
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let outcome = self.emails.get(email).copied().unwrap_or(self.fetch_by_email);
        let mut user = self.fetch(outcome)?;
        user.email = email.to_string();
        Ok(user)
    }

    async fn get_for_token(
        &self,
        scope: TokenScope,
        token_plaintext: &str,
    ) -> Result<User, StoreError> {
        let outcome = self
            .tokens
            .get(&(scope, token_plaintext.to_string()))
            .copied()
            .unwrap_or(self.fetch_for_token);
        self.fetch(outcome)
    }

    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        assert!(user.credential.is_set(), "missing password hash for user");
        match self.update {
            UpdateOutcome::Updated => {
                user.version += 1;
                Ok(())
            }
            UpdateOutcome::DuplicateEmail => Err(StoreError::DuplicateEmail),
            UpdateOutcome::EditConflict => Err(StoreError::EditConflict),
            UpdateOutcome::Failed(kind) => Err(StoreError::Backend(kind)),
        }
    }
}
