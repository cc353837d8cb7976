use serde::{Deserialize, Serialize};

use super::{GroupId, UserId};

/// A named set of users. Only the creator may rename it, change its
/// membership or delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub creator: UserId,
    pub name: String,
}

impl Group {
    pub fn new(id: GroupId, creator: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            creator,
            name: name.into(),
        }
    }

    /// Rename the group.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDraft {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRequest {
    pub member_id: UserId,
}
