//! In-memory store.
//!
//! All tables sit behind one lock, so identity generation and cascading
//! deletes are serialized with every other write.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{EntityKind, FencedWrite, Store, StoreError};
use crate::models::{
    AccessLevel, AccessOverride, DocId, Document, Group, GroupId, Subject, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    counters: HashMap<EntityKind, i64>,
    users: BTreeMap<UserId, User>,
    credentials: HashMap<UserId, String>,
    documents: BTreeMap<DocId, Document>,
    groups: BTreeMap<GroupId, Group>,
    members: BTreeMap<GroupId, BTreeSet<UserId>>,
    user_access: HashMap<(DocId, UserId), AccessLevel>,
    group_access: BTreeMap<(DocId, GroupId), AccessLevel>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn next_id(&self, kind: EntityKind) -> Result<i64, StoreError> {
        let mut tables = self.tables.write();
        let counter = tables.counters.entry(kind).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_user(&self, user: &User, credential: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {}", user.id)));
        }
        if tables.users.values().any(|u| u.login == user.login) {
            return Err(StoreError::Conflict(format!("login '{}'", user.login)));
        }
        tables.users.insert(user.id, user.clone());
        tables.credentials.insert(user.id, credential.to_string());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read();
        Ok(tables.users.values().find(|u| u.login == login).cloned())
    }

    async fn login_exists(&self, login: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read();
        Ok(tables.users.values().any(|u| u.login == login))
    }

    async fn credential(&self, id: UserId) -> Result<Option<String>, StoreError> {
        Ok(self.tables.read().credentials.get(&id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.login == user.login)
        {
            return Err(StoreError::Conflict(format!("login '{}'", user.login)));
        }
        match tables.users.get_mut(&user.id) {
            Some(stored) => {
                stored.login = user.login.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.read().users.values().cloned().collect())
    }

    async fn insert_document(&self, doc: &Document) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.documents.contains_key(&doc.id) {
            return Err(StoreError::Conflict(format!("document {}", doc.id)));
        }
        tables.documents.insert(doc.id, doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: DocId) -> Result<Option<Document>, StoreError> {
        Ok(self.tables.read().documents.get(&id).cloned())
    }

    async fn update_document(&self, doc: &Document) -> Result<Option<Document>, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables
            .documents
            .get_mut(&doc.id)
            .map(|stored| overwrite(stored, doc)))
    }

    async fn update_document_if_version(
        &self,
        doc: &Document,
    ) -> Result<FencedWrite, StoreError> {
        let mut tables = self.tables.write();
        let Some(stored) = tables.documents.get_mut(&doc.id) else {
            return Ok(FencedWrite::Missing);
        };
        if stored.version != doc.version {
            return Ok(FencedWrite::Stale {
                current: stored.version,
            });
        }
        Ok(FencedWrite::Written(overwrite(stored, doc)))
    }

    async fn delete_document(&self, id: DocId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if tables.documents.remove(&id).is_none() {
            return Ok(false);
        }
        tables.user_access.retain(|(doc, _), _| *doc != id);
        tables.group_access.retain(|(doc, _), _| *doc != id);
        Ok(true)
    }

    async fn documents_owned_by(&self, owner: UserId) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .documents
            .values()
            .filter(|d| d.owner == Some(owner))
            .cloned()
            .collect())
    }

    async fn set_override(&self, grant: &AccessOverride) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        match grant.subject {
            Subject::User(user) => {
                tables.user_access.insert((grant.doc_id, user), grant.level);
            }
            Subject::Group(group) => {
                tables.group_access.insert((grant.doc_id, group), grant.level);
            }
        }
        Ok(())
    }

    async fn user_override(
        &self,
        doc: DocId,
        user: UserId,
    ) -> Result<Option<AccessLevel>, StoreError> {
        Ok(self.tables.read().user_access.get(&(doc, user)).copied())
    }

    async fn group_overrides(
        &self,
        doc: DocId,
    ) -> Result<Vec<(GroupId, AccessLevel)>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .group_access
            .range((doc, GroupId::MIN)..=(doc, GroupId::MAX))
            .map(|(&(_, group), &level)| (group, level))
            .collect())
    }

    async fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!("group {}", group.id)));
        }
        tables.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.tables.read().groups.get(&id).cloned())
    }

    async fn update_group(&self, group: &Group) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        match tables.groups.get_mut(&group.id) {
            Some(stored) => {
                stored.name = group.name.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_group(&self, id: GroupId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if tables.groups.remove(&id).is_none() {
            return Ok(false);
        }
        tables.members.remove(&id);
        tables.group_access.retain(|(_, group), _| *group != id);
        Ok(true)
    }

    async fn add_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables.members.entry(group).or_default().insert(user))
    }

    async fn remove_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables
            .members
            .get_mut(&group)
            .is_some_and(|members| members.remove(&user)))
    }

    async fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .members
            .get(&group)
            .is_some_and(|members| members.contains(&user)))
    }

    async fn members(
        &self,
        group: GroupId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read();
        let Some(members) = tables.members.get(&group) else {
            return Ok(Vec::new());
        };
        Ok(members
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        *self.tables.write() = Tables::default();
        Ok(())
    }
}

/// Copies the editable fields of `doc` into `stored` and bumps its version.
fn overwrite(stored: &mut Document, doc: &Document) -> Document {
    stored.text = doc.text.clone();
    stored.lang = doc.lang.clone();
    stored.access = doc.access;
    stored.lint_status = doc.lint_status.clone();
    stored.version += 1;
    stored.clone()
}
