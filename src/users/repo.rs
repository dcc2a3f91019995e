use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::users::errors::{FailureKind, StoreError};
use crate::users::repo_types::{User, UserRow};
use crate::users::tokens::{token_digest, TokenScope};

/// Name of the case-insensitive unique index on `users.email`.
pub const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Persistence contract for users. Implementations hold no mutable
/// in-process state and are safe to share across tasks.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists a new user and fills in `id`, `created_at` and `version`.
    /// The email is stored as given; two emails differing only in case
    /// collide with `DuplicateEmail`.
    async fn insert(&self, user: &mut User) -> Result<(), StoreError>;

    /// Emails are matched ignoring case, the same way uniqueness is enforced.
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Finds the owner of an unexpired token issued for `scope`.
    async fn get_for_token(
        &self,
        scope: TokenScope,
        token_plaintext: &str,
    ) -> Result<User, StoreError>;

    /// Writes `user` if the stored version still equals `user.version`, then
    /// stores the incremented version back into `user`.
    async fn update(&self, user: &mut User) -> Result<(), StoreError>;
}

/// PostgreSQL-backed [`UserStore`].
#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<Result<T, sqlx::Error>, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            error!(op, timeout_ms = self.timeout.as_millis() as u64, "user store call timed out");
            StoreError::Backend(FailureKind::Timeout)
        })
    }
}

/// Maps a driver error onto the store taxonomy. `missing` is what an empty
/// result means for the calling operation.
pub(crate) fn classify(op: &'static str, err: sqlx::Error, missing: StoreError) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => missing,
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some(USERS_EMAIL_CONSTRAINT) =>
        {
            StoreError::DuplicateEmail
        }
        sqlx::Error::Database(db) => {
            error!(op, code = ?db.code(), constraint = ?db.constraint(), error = %db, "database error");
            StoreError::Backend(FailureKind::Unknown)
        }
        e @ (sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed) => {
            error!(op, error = %e, "database unavailable");
            StoreError::Backend(FailureKind::Unavailable)
        }
        e => {
            error!(op, error = %e, "unexpected database error");
            StoreError::Backend(FailureKind::Unknown)
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: &mut User) -> Result<(), StoreError> {
        let hash = user.credential.persisted_hash();
        let row = self
            .bounded(
                "insert",
                sqlx::query_as::<_, (Uuid, OffsetDateTime, i32)>(
                    r#"
                    INSERT INTO users (name, email, password_hash, activated)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, created_at, version
                    "#,
                )
                .bind(&user.name)
                .bind(&user.email)
                .bind(hash)
                .bind(user.activated)
                .fetch_one(&self.db),
            )
            .await?;

        let (id, created_at, version) = row.map_err(|e| {
            let err = classify("insert", e, StoreError::Backend(FailureKind::Unknown));
            if err == StoreError::DuplicateEmail {
                warn!("insert rejected: duplicate email");
            }
            err
        })?;

        user.id = id;
        user.created_at = created_at;
        user.version = version;
        debug!(user_id = %id, "user inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = self
            .bounded(
                "get_by_email",
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, created_at, name, email, password_hash, activated, version
                    FROM users
                    WHERE lower(email) = lower($1)
                    "#,
                )
                .bind(email)
                .fetch_one(&self.db),
            )
            .await?
            .map_err(|e| classify("get_by_email", e, StoreError::NotFound))?;

        Ok(row.into())
    }

    #[instrument(skip(self, token_plaintext), fields(scope = %scope))]
    async fn get_for_token(
        &self,
        scope: TokenScope,
        token_plaintext: &str,
    ) -> Result<User, StoreError> {
        let digest = token_digest(token_plaintext);
        let row = self
            .bounded(
                "get_for_token",
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT users.id, users.created_at, users.name, users.email,
                           users.password_hash, users.activated, users.version
                    FROM users
                    INNER JOIN tokens ON users.id = tokens.user_id
                    WHERE tokens.hash = $1
                      AND tokens.scope = $2
                      AND tokens.expiry > $3
                    "#,
                )
                .bind(&digest[..])
                .bind(scope.as_str())
                .bind(OffsetDateTime::now_utc())
                .fetch_one(&self.db),
            )
            .await?
            .map_err(|e| classify("get_for_token", e, StoreError::NotFound))?;

        debug!(user_id = %row.id, "token resolved");
        Ok(row.into())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, version = user.version))]
    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        let hash = user.credential.persisted_hash();
        let version = self
            .bounded(
                "update",
                sqlx::query_scalar::<_, i32>(
                    r#"
                    UPDATE users
                    SET name = $1, email = $2, password_hash = $3, activated = $4,
                        version = version + 1
                    WHERE id = $5 AND version = $6
                    RETURNING version
                    "#,
                )
                .bind(&user.name)
                .bind(&user.email)
                .bind(hash)
                .bind(user.activated)
                .bind(user.id)
                .bind(user.version)
                .fetch_one(&self.db),
            )
            .await?
            .map_err(|e| {
                let err = classify("update", e, StoreError::EditConflict);
                match err {
                    StoreError::EditConflict => warn!("update rejected: edit conflict"),
                    StoreError::DuplicateEmail => warn!("update rejected: duplicate email"),
                    _ => {}
                }
                err
            })?;

        user.version = version;
        debug!(new_version = version, "user updated");
        Ok(())
    }
}
