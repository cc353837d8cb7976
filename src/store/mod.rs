//! Persistence for users, documents, groups and access overrides.
//!
//! [`Store`] is the only shared mutable state in the service. Two backends
//! are provided: [`SqliteStore`] for deployments and [`MemoryStore`] for
//! tests and throwaway servers.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::{AccessLevel, AccessOverride, DocId, Document, Group, GroupId, User, UserId};

/// Entity kinds with their own identity counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Document,
    Group,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Document => "document",
            EntityKind::Group => "group",
        }
    }
}

/// Outcome of a version-fenced document write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FencedWrite {
    /// The write landed; carries the stored document with its new version.
    Written(Document),
    /// The stored version moved on; nothing was written.
    Stale { current: i64 },
    /// The document no longer exists.
    Missing,
}

/// Errors that can occur in a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    /// A uniqueness constraint was violated.
    #[error("{0} already exists")]
    Conflict(String),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Storage contract used by the resolver, the services and the pipeline.
///
/// Lookups return `Ok(None)`/`Ok(false)` for absent entities; `Err` is
/// reserved for backend failures.
#[async_trait]
pub trait Store: Send + Sync {
    /// Next identity for `kind`. Monotonic per kind, starting at 1, and never
    /// handed out twice even under concurrent callers.
    async fn next_id(&self, kind: EntityKind) -> Result<i64, StoreError>;

    async fn insert_user(&self, user: &User, credential: &str) -> Result<(), StoreError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn login_exists(&self, login: &str) -> Result<bool, StoreError>;
    async fn credential(&self, id: UserId) -> Result<Option<String>, StoreError>;
    /// Returns `false` if the user does not exist.
    async fn update_user(&self, user: &User) -> Result<bool, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn insert_document(&self, doc: &Document) -> Result<(), StoreError>;
    async fn get_document(&self, id: DocId) -> Result<Option<Document>, StoreError>;
    /// Unconditional write. Owner is never changed; the version is bumped and
    /// the stored document returned. `Ok(None)` if the document is absent.
    async fn update_document(&self, doc: &Document) -> Result<Option<Document>, StoreError>;
    /// Writes only if the stored version still equals `doc.version`.
    async fn update_document_if_version(&self, doc: &Document)
        -> Result<FencedWrite, StoreError>;
    /// Deletes the document and its overrides. `false` if it was absent.
    async fn delete_document(&self, id: DocId) -> Result<bool, StoreError>;
    async fn documents_owned_by(&self, owner: UserId) -> Result<Vec<Document>, StoreError>;

    /// Inserts or replaces the override for `(doc, subject)`.
    async fn set_override(&self, grant: &AccessOverride) -> Result<(), StoreError>;
    async fn user_override(
        &self,
        doc: DocId,
        user: UserId,
    ) -> Result<Option<AccessLevel>, StoreError>;
    async fn group_overrides(&self, doc: DocId)
        -> Result<Vec<(GroupId, AccessLevel)>, StoreError>;

    async fn insert_group(&self, group: &Group) -> Result<(), StoreError>;
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError>;
    async fn update_group(&self, group: &Group) -> Result<bool, StoreError>;
    /// Deletes the group, its memberships and its overrides.
    async fn delete_group(&self, id: GroupId) -> Result<bool, StoreError>;
    /// `false` if the user already was a member.
    async fn add_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError>;
    /// `false` if the user was not a member.
    async fn remove_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError>;
    async fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError>;
    /// Members ordered by user id.
    async fn members(
        &self,
        group: GroupId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<User>, StoreError>;

    /// Removes every record and restarts all identity counters.
    async fn reset(&self) -> Result<(), StoreError>;
}
