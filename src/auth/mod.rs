//! Credential hashing and bearer tokens.

mod password;
mod tokens;

pub use password::PasswordHasher;
pub use tokens::{Claims, TokenIssuer};
