use std::fmt;

use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    pub(crate) const fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

/// Failures collected while validating a whole user. Only the first reason
/// per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn add(&mut self, err: ValidationError) {
        if self.field(err.field).is_none() {
            self.0.push(err);
        }
    }

    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashingError {
    #[error("random source unavailable: {0}")]
    Entropy(String),
    #[error("password hashing failed: {0}")]
    Primitive(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("credential has no password hash")]
    MissingHash,
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
    #[error("password verification failed: {0}")]
    Primitive(String),
}

/// Infrastructure failure classes. Retryable, never user-actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("timed out")]
    Timeout,
    #[error("unavailable")]
    Unavailable,
    #[error("unknown failure")]
    Unknown,
}

/// Everything a store call can report to its caller.
///
/// `insert` returns `DuplicateEmail` or `Backend`; `get_by_email` and
/// `get_for_token` return `NotFound` or `Backend`; `update` returns
/// `DuplicateEmail`, `EditConflict` or `Backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    #[error("the requested record could not be found")]
    NotFound,
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("user store {0}")]
    Backend(FailureKind),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_first_reason_per_field() {
        let mut errs = ValidationErrors::default();
        errs.add(ValidationError::new("email", "must be provided"));
        errs.add(ValidationError::new("email", "must be a valid email address"));
        errs.add(ValidationError::new("name", "must be provided"));

        assert_eq!(errs.iter().count(), 2);
        assert_eq!(errs.field("email").map(|e| e.reason), Some("must be provided"));
        assert_eq!(
            errs.to_string(),
            "email: must be provided; name: must be provided"
        );
    }

    #[test]
    fn only_backend_failures_are_retryable() {
        assert!(StoreError::Backend(FailureKind::Timeout).is_retryable());
        assert!(StoreError::Backend(FailureKind::Unavailable).is_retryable());
        assert!(!StoreError::EditConflict.is_retryable());
        assert!(!StoreError::DuplicateEmail.is_retryable());
        assert!(!StoreError::NotFound.is_retryable());
    }

    #[test]
    fn timeout_message_names_the_kind() {
        let msg = StoreError::Backend(FailureKind::Timeout).to_string();
        assert_eq!(msg, "user store timed out");
    }
}
