pub mod errors;
pub mod fixture;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;
pub mod validation;

pub use errors::{FailureKind, HashingError, StoreError, ValidationError, ValidationErrors, VerificationError};
pub use password::{Credential, Plaintext};
pub use repo::{PgUserStore, UserStore};
pub use repo_types::{Identity, User};
pub use tokens::TokenScope;
