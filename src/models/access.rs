use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DocId, GroupId, UserId};

/// Permission level an actor holds on a document.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `None < Read < Edit < Absolute`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    Edit,
    Absolute,
}

impl AccessLevel {
    /// Integer code used by the SQLite store.
    pub fn code(self) -> i64 {
        match self {
            AccessLevel::None => 0,
            AccessLevel::Read => 1,
            AccessLevel::Edit => 2,
            AccessLevel::Absolute => 3,
        }
    }

    /// Inverse of [`AccessLevel::code`]. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AccessLevel::None),
            1 => Some(AccessLevel::Read),
            2 => Some(AccessLevel::Edit),
            3 => Some(AccessLevel::Absolute),
            _ => None,
        }
    }

    pub fn can_read(self) -> bool {
        self >= AccessLevel::Read
    }

    pub fn can_edit(self) -> bool {
        self >= AccessLevel::Edit
    }

    pub fn is_absolute(self) -> bool {
        self == AccessLevel::Absolute
    }

    /// Absolute belongs to the owner alone and can never be handed out,
    /// neither as a document default nor as an override.
    pub fn is_grantable(self) -> bool {
        self != AccessLevel::Absolute
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::None => write!(f, "none"),
            AccessLevel::Read => write!(f, "read"),
            AccessLevel::Edit => write!(f, "edit"),
            AccessLevel::Absolute => write!(f, "absolute"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(AccessLevel::None),
            "read" => Ok(AccessLevel::Read),
            "edit" => Ok(AccessLevel::Edit),
            "absolute" => Ok(AccessLevel::Absolute),
            _ => Err(format!(
                "Invalid access level '{}'. Valid options: none, read, edit, absolute",
                s
            )),
        }
    }
}

/// The identity on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    /// Unauthenticated caller.
    Anonymous,
    User(UserId),
}

impl Actor {
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Actor::Anonymous => None,
            Actor::User(id) => Some(id),
        }
    }
}

impl From<Option<UserId>> for Actor {
    fn from(id: Option<UserId>) -> Self {
        id.map_or(Actor::Anonymous, Actor::User)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Anonymous => write!(f, "anonymous"),
            Actor::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Who an override is granted to.
///
/// Serialized as `{"kind": "user", "id": 7}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    User(UserId),
    Group(GroupId),
}

/// An explicit grant attached to a document. At most one exists per
/// (document, subject); writing another replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessOverride {
    pub doc_id: DocId,
    pub subject: Subject,
    pub level: AccessLevel,
}

/// Body of a change-access request; the document comes from the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessChangeRequest {
    pub subject: Subject,
    pub access: AccessLevel,
}
