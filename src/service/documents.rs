use async_trait::async_trait;
use std::sync::Arc;

use super::require_user;
use crate::access::AccessResolver;
use crate::lint::NO_INSPECTION;
use crate::models::{
    AccessChangeRequest, AccessLevel, AccessOverride, Actor, DocId, Document, DocumentDraft,
    DocumentUpdate, Subject,
};
use crate::pipeline::{InspectionQueue, InspectionSink, WriteBack};
use crate::store::{EntityKind, FencedWrite, Store};
use crate::{Error, Result};

/// Document operations, each gated by the actor's resolved level.
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn Store>,
    resolver: AccessResolver,
    queue: InspectionQueue,
}

impl DocumentService {
    pub fn new(store: Arc<dyn Store>, queue: InspectionQueue) -> Self {
        Self {
            resolver: AccessResolver::new(store.clone()),
            store,
            queue,
        }
    }

    /// Stores a new document owned by `actor` and queues it for inspection.
    pub async fn create(&self, actor: Actor, draft: DocumentDraft) -> Result<Document> {
        check_default_level(draft.access)?;
        check_lang(&draft.lang)?;

        let doc = Document {
            id: self.store.next_id(EntityKind::Document).await?,
            owner: actor.user_id(),
            text: draft.text,
            lang: draft.lang,
            access: draft.access,
            lint_status: NO_INSPECTION.to_string(),
            version: 1,
        };
        self.store.insert_document(&doc).await?;
        tracing::info!(doc_id = doc.id, %actor, lang = %doc.lang, "Document created");

        self.queue.enqueue(doc.clone()).await?;
        Ok(doc)
    }

    /// The document as `actor` sees it: `access` holds the resolved level.
    pub async fn get(&self, actor: Actor, id: DocId) -> Result<Document> {
        let (doc, level) = self.resolver.resolve_document(actor, id).await?;
        if !level.can_read() {
            return Err(Error::NoAccess);
        }
        Ok(doc.with_access(level))
    }

    /// Replaces text and language, and the default level when the actor
    /// holds `Absolute`. Owner and lint status are kept.
    pub async fn edit(&self, actor: Actor, id: DocId, update: DocumentUpdate) -> Result<Document> {
        let (current, level) = self.resolver.resolve_document(actor, id).await?;
        if !level.can_edit() {
            return Err(Error::NoAccess);
        }
        check_lang(&update.lang)?;

        let access = match update.access {
            Some(access) if access != current.access => {
                if !level.is_absolute() {
                    return Err(Error::NoAccess);
                }
                check_default_level(access)?;
                access
            }
            _ => current.access,
        };

        let next = Document {
            text: update.text,
            lang: update.lang,
            access,
            ..current
        };
        let stored = self
            .store
            .update_document(&next)
            .await?
            .ok_or_else(|| Error::not_found("document", id))?;
        tracing::info!(doc_id = id, %actor, version = stored.version, "Document edited");

        self.queue.enqueue(stored.clone()).await?;
        Ok(stored)
    }

    /// Queues the stored document for another inspection.
    pub async fn launch_inspection(&self, actor: Actor, id: DocId) -> Result<()> {
        let (doc, level) = self.resolver.resolve_document(actor, id).await?;
        if !level.can_edit() {
            return Err(Error::NoAccess);
        }
        self.queue.enqueue(doc).await
    }

    pub async fn delete(&self, actor: Actor, id: DocId) -> Result<()> {
        let level = self.resolver.resolve(actor, id).await?;
        if !level.is_absolute() {
            return Err(Error::NoAccess);
        }
        if !self.store.delete_document(id).await? {
            return Err(Error::not_found("document", id));
        }
        tracing::info!(doc_id = id, %actor, "Document deleted");
        Ok(())
    }

    /// Grants `request.access` to a user or group.
    ///
    /// Returns the stored document with its default level, not re-resolved.
    pub async fn change_access(
        &self,
        actor: Actor,
        id: DocId,
        request: AccessChangeRequest,
    ) -> Result<Document> {
        let (doc, level) = self.resolver.resolve_document(actor, id).await?;
        if !level.is_absolute() {
            return Err(Error::NoAccess);
        }
        if !request.access.is_grantable() {
            return Err(Error::Invalid("absolute access cannot be granted".to_string()));
        }

        match request.subject {
            Subject::User(user) => {
                if self.store.get_user(user).await?.is_none() {
                    return Err(Error::not_found("user", user));
                }
            }
            Subject::Group(group) => {
                if self.store.get_group(group).await?.is_none() {
                    return Err(Error::not_found("group", group));
                }
            }
        }

        self.store
            .set_override(&AccessOverride {
                doc_id: id,
                subject: request.subject,
                level: request.access,
            })
            .await?;
        tracing::info!(
            doc_id = id,
            %actor,
            subject = ?request.subject,
            access = %request.access,
            "Access changed"
        );
        Ok(doc)
    }

    /// Documents owned by `actor`.
    pub async fn list_documents(&self, actor: Actor) -> Result<Vec<Document>> {
        let user = require_user(actor)?;
        Ok(self.store.documents_owned_by(user).await?)
    }

    /// Stores an inspection result on behalf of the document's owner.
    ///
    /// Only the lint status is taken from `inspected`, and only if the
    /// document has not been written since it was inspected. Nothing is
    /// queued for inspection.
    pub async fn apply_inspection(&self, inspected: Document) -> Result<WriteBack> {
        let Some(current) = self.store.get_document(inspected.id).await? else {
            return Ok(WriteBack::Missing);
        };

        let level = self
            .resolver
            .resolve_for(current.owner_actor(), &current)
            .await?;
        if !level.can_edit() {
            return Ok(WriteBack::Refused);
        }

        if current.version != inspected.version {
            return Ok(WriteBack::Stale {
                inspected: inspected.version,
                current: current.version,
            });
        }

        let next = Document {
            lint_status: inspected.lint_status,
            ..current
        };
        Ok(match self.store.update_document_if_version(&next).await? {
            FencedWrite::Written(_) => WriteBack::Written,
            FencedWrite::Stale { current } => WriteBack::Stale {
                inspected: inspected.version,
                current,
            },
            FencedWrite::Missing => WriteBack::Missing,
        })
    }
}

#[async_trait]
impl InspectionSink for DocumentService {
    async fn write_back(&self, doc: Document) -> Result<WriteBack> {
        self.apply_inspection(doc).await
    }
}

fn check_default_level(level: AccessLevel) -> Result<()> {
    if level.is_grantable() {
        Ok(())
    } else {
        Err(Error::Invalid(
            "absolute cannot be a default access level".to_string(),
        ))
    }
}

fn check_lang(lang: &str) -> Result<()> {
    if lang.trim().is_empty() {
        return Err(Error::Invalid("language tag is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::{LinterRegistry, StubLinter};
    use crate::models::{Group, User};
    use crate::pipeline::{inspection_queue, InspectionIntake, InspectionPipeline, PipelineConfig};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::time::Duration;

    const ANN: Actor = Actor::User(1);
    const BOB: Actor = Actor::User(2);

    async fn store_with_users() -> Arc<dyn Store> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        for login in ["ann", "bob"] {
            let user = User {
                id: store.next_id(EntityKind::User).await.unwrap(),
                login: login.to_string(),
                created_at: Utc::now(),
            };
            store.insert_user(&user, "salt$hash").await.unwrap();
        }
        store
    }

    /// Service whose queue nobody drains.
    async fn idle_service() -> (DocumentService, InspectionIntake) {
        let (queue, intake) = inspection_queue(&PipelineConfig::default());
        (DocumentService::new(store_with_users().await, queue), intake)
    }

    async fn running_service() -> (Arc<DocumentService>, InspectionPipeline) {
        let config = PipelineConfig {
            inspection_workers: 2,
            persistence_workers: 2,
            enqueue_timeout: None,
        };
        let (queue, intake) = inspection_queue(&config);
        let service = Arc::new(DocumentService::new(store_with_users().await, queue));
        let mut registry = LinterRegistry::new();
        registry.register("text", Arc::new(StubLinter::default()));
        let pipeline = InspectionPipeline::start(intake, Arc::new(registry), service.clone());
        (service, pipeline)
    }

    fn draft(text: &str, lang: &str, access: AccessLevel) -> DocumentDraft {
        DocumentDraft {
            text: text.to_string(),
            lang: lang.to_string(),
            access,
        }
    }

    fn update(text: &str, access: Option<AccessLevel>) -> DocumentUpdate {
        DocumentUpdate {
            text: text.to_string(),
            lang: "text".to_string(),
            access,
        }
    }

    async fn wait_for_status(service: &DocumentService, id: DocId, expected: &str) -> Document {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let doc = service.get(ANN, id).await.unwrap();
            if doc.lint_status == expected {
                return doc;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "lint status stuck at {:?}",
                doc.lint_status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_create_sets_owner_and_queues() {
        let (service, intake) = idle_service().await;

        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::Read))
            .await
            .unwrap();

        assert_eq!(doc.owner, Some(1));
        assert_eq!(doc.lint_status, "No inspection");
        assert_eq!(service.queue.len(), 1);
        drop(intake);
    }

    #[tokio::test]
    async fn test_create_rejects_absolute_default() {
        let (service, _intake) = idle_service().await;

        let result = service
            .create(ANN, draft("hello", "text", AccessLevel::Absolute))
            .await;
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[tokio::test]
    async fn test_create_with_closed_queue_is_unavailable() {
        let (service, intake) = idle_service().await;
        drop(intake);

        let result = service
            .create(ANN, draft("hello", "text", AccessLevel::None))
            .await;
        assert!(matches!(result, Err(Error::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_get_projects_resolved_level() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::Read))
            .await
            .unwrap();

        assert_eq!(
            service.get(ANN, doc.id).await.unwrap().access,
            AccessLevel::Absolute
        );
        assert_eq!(
            service.get(BOB, doc.id).await.unwrap().access,
            AccessLevel::Read
        );
    }

    #[tokio::test]
    async fn test_get_private_document_is_no_access() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("secret", "text", AccessLevel::None))
            .await
            .unwrap();

        assert!(matches!(service.get(BOB, doc.id).await, Err(Error::NoAccess)));
        assert!(matches!(
            service.get(Actor::Anonymous, doc.id).await,
            Err(Error::NoAccess)
        ));
        assert!(matches!(service.get(BOB, 99).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_edit_gates() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("v1", "text", AccessLevel::Read))
            .await
            .unwrap();

        // Read is not enough.
        let result = service.edit(BOB, doc.id, update("v2", None)).await;
        assert!(matches!(result, Err(Error::NoAccess)));

        service
            .change_access(
                ANN,
                doc.id,
                AccessChangeRequest {
                    subject: Subject::User(2),
                    access: AccessLevel::Edit,
                },
            )
            .await
            .unwrap();

        // Edit level with the default unchanged succeeds and keeps it.
        let edited = service
            .edit(BOB, doc.id, update("v2", Some(AccessLevel::Read)))
            .await
            .unwrap();
        assert_eq!(edited.text, "v2");
        assert_eq!(edited.access, AccessLevel::Read);
        assert_eq!(edited.owner, Some(1));

        // Changing the default needs absolute.
        let result = service
            .edit(BOB, doc.id, update("v3", Some(AccessLevel::Edit)))
            .await;
        assert!(matches!(result, Err(Error::NoAccess)));

        let edited = service
            .edit(ANN, doc.id, update("v3", Some(AccessLevel::Edit)))
            .await
            .unwrap();
        assert_eq!(edited.access, AccessLevel::Edit);
        assert_eq!(edited.version, 3);
    }

    #[tokio::test]
    async fn test_edit_requires_language_tag() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("v1", "text", AccessLevel::None))
            .await
            .unwrap();

        let blank = DocumentUpdate {
            text: "v2".to_string(),
            lang: "  ".to_string(),
            access: None,
        };
        let result = service.edit(ANN, doc.id, blank.clone()).await;
        assert!(matches!(result, Err(Error::Invalid(_))));

        // The access gate still comes first.
        let result = service.edit(BOB, doc.id, blank).await;
        assert!(matches!(result, Err(Error::NoAccess)));

        let stored = service.get(ANN, doc.id).await.unwrap();
        assert_eq!(stored.text, "v1");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_delete_requires_absolute() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::Edit))
            .await
            .unwrap();

        assert!(matches!(service.delete(BOB, doc.id).await, Err(Error::NoAccess)));
        service.delete(ANN, doc.id).await.unwrap();
        assert!(matches!(service.get(ANN, doc.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_change_access_checks() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::None))
            .await
            .unwrap();
        let grant = |subject, access| AccessChangeRequest { subject, access };

        let result = service
            .change_access(BOB, doc.id, grant(Subject::User(2), AccessLevel::Edit))
            .await;
        assert!(matches!(result, Err(Error::NoAccess)));

        let result = service
            .change_access(ANN, doc.id, grant(Subject::User(2), AccessLevel::Absolute))
            .await;
        assert!(matches!(result, Err(Error::Invalid(_))));

        let result = service
            .change_access(ANN, doc.id, grant(Subject::User(77), AccessLevel::Read))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = service
            .change_access(ANN, doc.id, grant(Subject::Group(5), AccessLevel::Read))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // Returned as stored, not as the owner sees it.
        let returned = service
            .change_access(ANN, doc.id, grant(Subject::User(2), AccessLevel::Read))
            .await
            .unwrap();
        assert_eq!(returned.access, AccessLevel::None);
    }

    #[tokio::test]
    async fn test_group_grant_allows_edit() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::None))
            .await
            .unwrap();
        service
            .store
            .insert_group(&Group::new(1, 1, "editors"))
            .await
            .unwrap();
        service.store.add_member(1, 2).await.unwrap();
        service
            .change_access(
                ANN,
                doc.id,
                AccessChangeRequest {
                    subject: Subject::Group(1),
                    access: AccessLevel::Edit,
                },
            )
            .await
            .unwrap();

        service.edit(BOB, doc.id, update("by bob", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_inspection_requires_edit() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::Read))
            .await
            .unwrap();

        let result = service.launch_inspection(BOB, doc.id).await;
        assert!(matches!(result, Err(Error::NoAccess)));

        service.launch_inspection(ANN, doc.id).await.unwrap();
        assert_eq!(service.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_list_documents_needs_a_user() {
        let (service, _intake) = idle_service().await;
        service
            .create(ANN, draft("a", "text", AccessLevel::None))
            .await
            .unwrap();
        service
            .create(BOB, draft("b", "text", AccessLevel::None))
            .await
            .unwrap();

        let own = service.list_documents(ANN).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].text, "a");
        assert!(matches!(
            service.list_documents(Actor::Anonymous).await,
            Err(Error::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_apply_inspection_discards_stale_result() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("v1", "text", AccessLevel::None))
            .await
            .unwrap();
        service.edit(ANN, doc.id, update("v2", None)).await.unwrap();

        let mut inspected = doc.clone();
        inspected.lint_status = "Text inspected".to_string();
        let outcome = service.apply_inspection(inspected).await.unwrap();
        assert_eq!(
            outcome,
            WriteBack::Stale {
                inspected: 1,
                current: 2
            }
        );
        assert_eq!(service.get(ANN, doc.id).await.unwrap().lint_status, "No inspection");
    }

    #[tokio::test]
    async fn test_apply_inspection_keeps_text_and_does_not_requeue() {
        let (service, _intake) = idle_service().await;
        let doc = service
            .create(ANN, draft("v1", "text", AccessLevel::None))
            .await
            .unwrap();
        let queued = service.queue.len();

        let mut inspected = doc.clone();
        inspected.lint_status = "fine".to_string();
        inspected.text = "tampered".to_string();
        assert_eq!(
            service.apply_inspection(inspected).await.unwrap(),
            WriteBack::Written
        );

        let stored = service.get(ANN, doc.id).await.unwrap();
        assert_eq!(stored.lint_status, "fine");
        assert_eq!(stored.text, "v1");
        assert_eq!(service.queue.len(), queued);
    }

    #[tokio::test]
    async fn test_apply_inspection_for_anonymous_owner() {
        let (service, _intake) = idle_service().await;
        let private = service
            .create(Actor::Anonymous, draft("a", "text", AccessLevel::Read))
            .await
            .unwrap();
        let open = service
            .create(Actor::Anonymous, draft("b", "text", AccessLevel::Edit))
            .await
            .unwrap();

        assert_eq!(
            service.apply_inspection(private).await.unwrap(),
            WriteBack::Refused
        );
        assert_eq!(
            service.apply_inspection(open).await.unwrap(),
            WriteBack::Written
        );
    }

    #[tokio::test]
    async fn test_unregistered_language_status() {
        let (service, pipeline) = running_service().await;

        let doc = service
            .create(ANN, draft("fn main() {}", "rust", AccessLevel::None))
            .await
            .unwrap();

        wait_for_status(&service, doc.id, "No inspection for rust").await;
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_launch_inspection_twice_is_stable() {
        let (service, pipeline) = running_service().await;
        let doc = service
            .create(ANN, draft("hello", "text", AccessLevel::None))
            .await
            .unwrap();
        wait_for_status(&service, doc.id, "Text inspected").await;

        for _ in 0..2 {
            service.launch_inspection(ANN, doc.id).await.unwrap();
            wait_for_status(&service, doc.id, "Text inspected").await;
        }
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_share_edit_and_inspect_end_to_end() {
        let (service, pipeline) = running_service().await;

        let doc = service
            .create(ANN, draft("first draft", "text", AccessLevel::Read))
            .await
            .unwrap();
        service
            .change_access(
                ANN,
                doc.id,
                AccessChangeRequest {
                    subject: Subject::User(2),
                    access: AccessLevel::None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(service.get(BOB, doc.id).await, Err(Error::NoAccess)));

        service
            .change_access(
                ANN,
                doc.id,
                AccessChangeRequest {
                    subject: Subject::User(2),
                    access: AccessLevel::Edit,
                },
            )
            .await
            .unwrap();
        let seen = service.get(BOB, doc.id).await.unwrap();
        assert_eq!(seen.access, AccessLevel::Edit);
        assert_eq!(seen.text, "first draft");

        service
            .edit(BOB, doc.id, update("second draft", None))
            .await
            .unwrap();

        let done = wait_for_status(&service, doc.id, "Text inspected").await;
        assert_eq!(done.text, "second draft");
        assert_eq!(done.owner, Some(1));
        pipeline.shutdown().await;
    }
}
