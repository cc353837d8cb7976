use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AccessLevel, Actor, DocId, UserId};

/// A stored document.
///
/// `access` is the document's default level. Read paths that return a
/// document to a caller replace it with the caller's resolved level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    /// `None` when created by an anonymous caller.
    pub owner: Option<UserId>,
    pub text: String,
    pub lang: String,
    pub access: AccessLevel,
    pub lint_status: String,
    /// Bumped by the store on every write.
    pub version: i64,
}

impl Document {
    pub fn owner_actor(&self) -> Actor {
        Actor::from(self.owner)
    }

    /// Returns the document with its `access` field replaced.
    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document {} ({}, version {})", self.id, self.lang, self.version)?;
        match self.owner {
            Some(owner) => writeln!(f, "  Owner:  user {}", owner)?,
            None => writeln!(f, "  Owner:  anonymous")?,
        }
        writeln!(f, "  Access: {}", self.access)?;
        writeln!(f, "  Lint:   {}", self.lint_status)?;
        writeln!(f)?;
        write!(f, "{}", self.text)
    }
}

/// Payload for creating a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub text: String,
    pub lang: String,
    /// Default level for everyone without an override. Private if omitted.
    #[serde(default)]
    pub access: AccessLevel,
}

/// Payload for editing a document.
///
/// Leaving `access` out keeps the current default level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub text: String,
    pub lang: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document {
            id: 1,
            owner: Some(7),
            text: "hello".to_string(),
            lang: "text".to_string(),
            access: AccessLevel::Read,
            lint_status: "No inspection".to_string(),
            version: 1,
        }
    }

    #[test]
    fn test_owner_actor() {
        let mut doc = sample();
        assert_eq!(doc.owner_actor(), Actor::User(7));

        doc.owner = None;
        assert_eq!(doc.owner_actor(), Actor::Anonymous);
    }

    #[test]
    fn test_with_access_only_touches_access() {
        let doc = sample().with_access(AccessLevel::Edit);
        assert_eq!(doc.access, AccessLevel::Edit);
        assert_eq!(doc.text, "hello");
        assert_eq!(doc.version, 1);
    }

    #[test]
    fn test_draft_access_defaults_to_none() {
        let draft: DocumentDraft =
            serde_json::from_str(r#"{"text":"fn main() {}","lang":"rust"}"#).unwrap();
        assert_eq!(draft.access, AccessLevel::None);
    }

    #[test]
    fn test_update_without_access() {
        let update: DocumentUpdate = serde_json::from_str(r#"{"text":"x","lang":"go"}"#).unwrap();
        assert_eq!(update.access, None);
    }
}
