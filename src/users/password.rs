use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::users::errors::{HashingError, VerificationError};

const SALT_LEN: usize = 16;

/// The persisted half of a user's secret: an argon2id PHC string, nothing else.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    hash: Option<String>,
}

/// Plaintext handed back by [`Credential::set_secret`]. It borrows the
/// caller's string, so it cannot outlive the scope that supplied it.
#[derive(Clone, Copy)]
pub struct Plaintext<'p>(&'p str);

impl<'p> Plaintext<'p> {
    pub fn as_str(&self) -> &'p str {
        self.0
    }
}

impl fmt::Debug for Plaintext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plaintext(<redacted>)")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.hash.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credential").field("hash", &state).finish()
    }
}

impl Credential {
    /// Rebuilds a credential from a stored hash.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
        }
    }

    pub fn is_set(&self) -> bool {
        self.hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Hash that goes into the `password_hash` column.
    ///
    /// Panics when no hash was ever set: reaching the store with an empty
    /// credential is a caller bug.
    pub(crate) fn persisted_hash(&self) -> &str {
        match self.hash.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => panic!("missing password hash for user"),
        }
    }

    /// Derives and stores a salted argon2id hash of `plaintext`.
    pub fn set_secret<'p>(&mut self, plaintext: &'p str) -> Result<Plaintext<'p>, HashingError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt_bytes).map_err(|e| {
            error!(error = %e, "os rng unavailable for salt");
            HashingError::Entropy(e.to_string())
        })?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| HashingError::Primitive(e.to_string()))?;

        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashingError::Primitive(e.to_string())
            })?
            .to_string();

        self.hash = Some(hash);
        Ok(Plaintext(plaintext))
    }

    /// Checks `candidate` against the stored hash. A wrong password is
    /// `Ok(false)`; only structural problems are errors.
    pub fn matches(&self, candidate: &str) -> Result<bool, VerificationError> {
        let hash = self.hash.as_deref().ok_or(VerificationError::MissingHash)?;
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            VerificationError::MalformedHash(e.to_string())
        })?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(VerificationError::Primitive(e.to_string()))
            }
        }
    }
}
