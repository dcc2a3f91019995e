use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Purpose a token was issued for. Stored verbatim in `tokens.scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenScope {
    Activation,
    Authentication,
    PasswordReset,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
            TokenScope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup digest for a plaintext token.
///
/// Tokens carry their own entropy, so a fast unsalted SHA-256 is enough to
/// keep plaintexts out of the table while still allowing an indexed lookup.
pub fn token_digest(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}
