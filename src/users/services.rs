use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::users::errors::{HashingError, StoreError, ValidationErrors, VerificationError};
use crate::users::repo::UserStore;
use crate::users::repo_types::{Identity, User};
use crate::users::tokens::TokenScope;
use crate::users::validation::{validate_email, validate_user};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Hashing(#[from] HashingError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates and persists a new user. The plaintext never outlives this call.
#[instrument(skip(store, password))]
pub async fn register_user(
    store: &dyn UserStore,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    let mut user = User::new(name, email.trim().to_lowercase());
    let plaintext = user.credential.set_secret(password)?;
    validate_user(&user, Some(&plaintext))?;

    store.insert(&mut user).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Looks a user up by email and checks the password. Unknown emails and
/// wrong passwords are reported identically.
#[instrument(skip(store, password))]
pub async fn authenticate(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    let email = email.trim().to_lowercase();
    validate_email(&email).map_err(ValidationErrors::from)?;

    let user = match store.get_by_email(&email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            warn!("login for unknown email");
            return Err(AccountError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !user.credential.matches(password)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AccountError::InvalidCredentials);
    }
    Ok(user)
}

/// Marks the owner of an activation token as activated.
#[instrument(skip(store, token))]
pub async fn activate_user(store: &dyn UserStore, token: &str) -> Result<User, AccountError> {
    let mut user = match store.get_for_token(TokenScope::Activation, token).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => return Err(AccountError::InvalidToken),
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    store.update(&mut user).await?;
    info!(user_id = %user.id, version = user.version, "user activated");
    Ok(user)
}

/// Sets a new password for the owner of a password-reset token.
#[instrument(skip(store, token, new_password))]
pub async fn reset_password(
    store: &dyn UserStore,
    token: &str,
    new_password: &str,
) -> Result<User, AccountError> {
    let mut user = match store.get_for_token(TokenScope::PasswordReset, token).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => return Err(AccountError::InvalidToken),
        Err(e) => return Err(e.into()),
    };

    let plaintext = user.credential.set_secret(new_password)?;
    validate_user(&user, Some(&plaintext))?;
    store.update(&mut user).await?;
    info!(user_id = %user.id, "password reset");
    Ok(user)
}

/// Resolves the identity behind an optional bearer token. No token means
/// anonymous; a token that resolves to nobody is an error.
pub async fn resolve_identity(
    store: &dyn UserStore,
    bearer: Option<&str>,
) -> Result<Identity, AccountError> {
    let Some(token) = bearer else {
        return Ok(Identity::Anonymous);
    };
    match store.get_for_token(TokenScope::Authentication, token).await {
        Ok(user) => Ok(Identity::Authenticated(user)),
        Err(StoreError::NotFound) => Err(AccountError::InvalidToken),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::errors::FailureKind;
    use crate::users::fixture::{
        FetchOutcome, FixtureUserStore, Scenario, UpdateOutcome, FIXTURE_PASSWORD,
    };

    fn store(scenario: Scenario) -> FixtureUserStore {
        FixtureUserStore::new(scenario).expect("fixture credential")
    }

    #[tokio::test]
    async fn register_normalizes_email_and_persists() {
        let store = store(Scenario::HappyPath);
        let user = register_user(&store, "Alice", "  Alice@Example.COM ", "alice-pa55word")
            .await
            .expect("register");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.version, 1);
        assert!(user.credential.matches("alice-pa55word").expect("verify"));
    }

    #[tokio::test]
    async fn register_rejects_short_password_before_store() {
        let store = store(Scenario::StoreDown);
        let err = register_user(&store, "Alice", "alice@example.com", "short")
            .await
            .unwrap_err();
        match err {
            AccountError::Validation(errs) => assert!(errs.field("password").is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_surfaces_duplicate_email() {
        let store = store(Scenario::EmailTaken);
        let err = register_user(&store, "Alice", "alice@example.com", "alice-pa55word")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Store(StoreError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let store = store(Scenario::HappyPath);
        let user = authenticate(&store, "bob@example.com", FIXTURE_PASSWORD)
            .await
            .expect("login");
        assert_eq!(user.email, "bob@example.com");

        let wrong = format!("{FIXTURE_PASSWORD}x");
        let err = authenticate(&store, "bob@example.com", &wrong).await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn authenticate_hides_unknown_accounts() {
        let store = store(Scenario::UnknownAccount);
        let err = authenticate(&store, "ghost@example.com", FIXTURE_PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn authenticate_passes_through_backend_failures() {
        let store = store(Scenario::HappyPath)
            .with_email("slow@example.com", FetchOutcome::Failed(FailureKind::Timeout));
        let err = authenticate(&store, "slow@example.com", FIXTURE_PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountError::Store(StoreError::Backend(FailureKind::Timeout))
        ));
    }

    #[tokio::test]
    async fn activation_flips_flag_and_bumps_version() {
        let mut dormant = User::new("Dormant", "dormant@example.com");
        dormant.version = 4;
        let store = store(Scenario::HappyPath).with_user(dormant);

        let user = activate_user(&store, "activation-token").await.expect("activate");
        assert!(user.activated);
        assert_eq!(user.version, 5);
    }

    #[tokio::test]
    async fn activation_maps_missing_token_and_conflicts() {
        let store = store(Scenario::HappyPath)
            .with_token(TokenScope::Activation, "stale", FetchOutcome::NotFound);
        assert!(matches!(
            activate_user(&store, "stale").await.unwrap_err(),
            AccountError::InvalidToken
        ));

        let store = store_with_update(UpdateOutcome::EditConflict);
        assert!(matches!(
            activate_user(&store, "fresh").await.unwrap_err(),
            AccountError::Store(StoreError::EditConflict)
        ));
    }

    fn store_with_update(outcome: UpdateOutcome) -> FixtureUserStore {
        store(Scenario::HappyPath).on_update(outcome)
    }

    #[tokio::test]
    async fn reset_password_rehashes() {
        let store = store(Scenario::HappyPath);
        let user = reset_password(&store, "reset-token", "brand-new-secret")
            .await
            .expect("reset");
        assert!(user.credential.matches("brand-new-secret").expect("verify"));
        assert!(!user.credential.matches(FIXTURE_PASSWORD).expect("verify"));

        let err = reset_password(&store, "reset-token", "tiny").await.unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
    }

    #[tokio::test]
    async fn identity_resolution() {
        let store = store(Scenario::HappyPath)
            .with_token(TokenScope::Authentication, "revoked", FetchOutcome::NotFound);

        let anon = resolve_identity(&store, None).await.expect("anonymous");
        assert!(anon.is_anonymous());

        let who = resolve_identity(&store, Some("good")).await.expect("user");
        assert!(!who.is_anonymous());
        assert_eq!(who.user().map(|u| u.id), Some(store.canned_user().id));

        assert!(matches!(
            resolve_identity(&store, Some("revoked")).await.unwrap_err(),
            AccountError::InvalidToken
        ));
    }
}
