use lazy_static::lazy_static;
use regex::Regex;

use crate::users::errors::{ValidationError, ValidationErrors};
use crate::users::password::Plaintext;
use crate::users::repo_types::User;

pub const PASSWORD_MIN_BYTES: usize = 8;
/// Inputs past this length are not worth hashing; treat them as invalid.
pub const PASSWORD_MAX_BYTES: usize = 72;
pub const NAME_MAX_BYTES: usize = 500;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        // HTML5 input[type=email] pattern.
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::new("email", "must be provided"));
    }
    if !is_valid_email(email) {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }
    Ok(())
}

pub fn validate_password_plaintext(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new("password", "must be provided"));
    }
    if password.len() < PASSWORD_MIN_BYTES {
        return Err(ValidationError::new(
            "password",
            "must be at least 8 bytes long",
        ));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        return Err(ValidationError::new(
            "password",
            "must not be more than 72 bytes long",
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("name", "must be provided"));
    }
    if name.len() > NAME_MAX_BYTES {
        return Err(ValidationError::new(
            "name",
            "must not be more than 500 bytes long",
        ));
    }
    Ok(())
}

/// Validates a candidate user before it is handed to a store.
///
/// `plaintext` is whatever [`Credential::set_secret`] returned in the same
/// call scope, if the password was (re)set; it is checked for length.
///
/// # Panics
///
/// When the user's credential carries no hash. Callers must set a credential
/// before validating.
///
/// [`Credential::set_secret`]: crate::users::password::Credential::set_secret
pub fn validate_user(user: &User, plaintext: Option<&Plaintext<'_>>) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::default();

    if let Err(e) = validate_name(&user.name) {
        errs.add(e);
    }
    if let Err(e) = validate_email(&user.email) {
        errs.add(e);
    }
    if let Some(p) = plaintext {
        if let Err(e) = validate_password_plaintext(p.as_str()) {
            errs.add(e);
        }
    }

    assert!(user.credential.is_set(), "missing password hash for user");

    errs.into_result()
}
