//! Effective access resolution for an (actor, document) pair.

use std::sync::Arc;

use crate::models::{AccessLevel, Actor, DocId, Document};
use crate::store::Store;
use crate::{Error, Result};

/// Computes the single effective [`AccessLevel`] an actor holds on a document.
///
/// Sources are consulted in a fixed order: the anonymous actor gets the
/// document default, the owner gets `Absolute`, a per-user override wins
/// outright, and otherwise group overrides can only raise the default.
#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn Store>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolved level for `actor` on document `doc_id`.
    pub async fn resolve(&self, actor: Actor, doc_id: DocId) -> Result<AccessLevel> {
        let (_, level) = self.resolve_document(actor, doc_id).await?;
        Ok(level)
    }

    /// Loads the document and resolves in one go, so callers that need both
    /// do not fetch twice.
    pub async fn resolve_document(
        &self,
        actor: Actor,
        doc_id: DocId,
    ) -> Result<(Document, AccessLevel)> {
        let doc = self
            .store
            .get_document(doc_id)
            .await?
            .ok_or_else(|| Error::not_found("document", doc_id))?;
        let level = self.resolve_for(actor, &doc).await?;
        Ok((doc, level))
    }

    /// Resolves against an already loaded document.
    pub async fn resolve_for(&self, actor: Actor, doc: &Document) -> Result<AccessLevel> {
        let user = match actor {
            Actor::Anonymous => return Ok(doc.access),
            Actor::User(user) => user,
        };

        if doc.owner == Some(user) {
            return Ok(AccessLevel::Absolute);
        }

        if let Some(level) = self.store.user_override(doc.id, user).await? {
            return Ok(level);
        }

        let mut level = doc.access;
        for (group, granted) in self.store.group_overrides(doc.id).await? {
            // A grant that cannot raise the running level needs no membership check.
            if granted <= level {
                continue;
            }
            if self.store.is_member(group, user).await? {
                level = granted;
            }
        }
        Ok(level)
    }
}
