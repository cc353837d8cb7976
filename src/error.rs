//! Error type shared by the resolver, the services and the HTTP layer.

use crate::store::StoreError;

/// Errors returned by docshare operations.
///
/// `NotFound` and `NoAccess` stay separate variants even where the HTTP
/// layer could fold them together.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The actor's resolved level is too low for the operation.
    #[error("no access")]
    NoAccess,

    /// Identity or login collision.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The inspection queue is saturated or shut down.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Malformed or disallowed request payload.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Missing, wrong or expired credentials.
    #[error("authentication required")]
    Unauthenticated,

    /// Hashing or checking a credential failed.
    #[error("credential error: {0}")]
    Credential(String),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Storage(StoreError),
}

impl Error {
    /// Short machine-readable name, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::NoAccess => "no_access",
            Error::AlreadyExists(_) => "already_exists",
            Error::Unavailable(_) => "unavailable",
            Error::Invalid(_) => "invalid",
            Error::Unauthenticated => "unauthenticated",
            Error::Credential(_) => "credential",
            Error::Token(_) => "token",
            Error::Storage(_) => "storage",
        }
    }

    pub(crate) fn not_found(kind: &str, id: i64) -> Self {
        Error::NotFound(format!("{} {}", kind, id))
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => Error::AlreadyExists(what),
            other => Error::Storage(other),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
