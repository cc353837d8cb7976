use std::sync::Arc;

use super::require_user;
use crate::models::{Actor, Group, GroupDraft, GroupId, User, UserId};
use crate::store::{EntityKind, Store};
use crate::{Error, Result};

/// Group management. Only a group's creator may change or inspect it.
#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn Store>,
}

impl GroupService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, actor: Actor, draft: GroupDraft) -> Result<Group> {
        let creator = require_user(actor)?;
        let name = checked_name(&draft.name)?;

        let group = Group::new(self.store.next_id(EntityKind::Group).await?, creator, name);
        self.store.insert_group(&group).await?;
        tracing::info!(group_id = group.id, creator, "Group created");
        Ok(group)
    }

    pub async fn rename(&self, actor: Actor, id: GroupId, draft: GroupDraft) -> Result<Group> {
        let mut group = self.owned_group(actor, id).await?;
        group.rename(checked_name(&draft.name)?);

        if !self.store.update_group(&group).await? {
            return Err(Error::not_found("group", id));
        }
        Ok(group)
    }

    pub async fn delete(&self, actor: Actor, id: GroupId) -> Result<()> {
        self.owned_group(actor, id).await?;
        if !self.store.delete_group(id).await? {
            return Err(Error::not_found("group", id));
        }
        tracing::info!(group_id = id, "Group deleted");
        Ok(())
    }

    /// Adds `member`. Adding an existing member is a no-op.
    pub async fn add_member(&self, actor: Actor, id: GroupId, member: UserId) -> Result<()> {
        self.owned_group(actor, id).await?;
        self.require_existing_user(member).await?;

        if self.store.add_member(id, member).await? {
            tracing::info!(group_id = id, member, "Member added");
        }
        Ok(())
    }

    pub async fn remove_member(&self, actor: Actor, id: GroupId, member: UserId) -> Result<()> {
        self.owned_group(actor, id).await?;
        self.require_existing_user(member).await?;

        if !self.store.remove_member(id, member).await? {
            return Err(Error::NotFound(format!("member {} of group {}", member, id)));
        }
        tracing::info!(group_id = id, member, "Member removed");
        Ok(())
    }

    /// A page of members, ordered by user id.
    pub async fn members(
        &self,
        actor: Actor,
        id: GroupId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<User>> {
        self.owned_group(actor, id).await?;
        Ok(self.store.members(id, offset, limit).await?)
    }

    async fn owned_group(&self, actor: Actor, id: GroupId) -> Result<Group> {
        let user = require_user(actor)?;
        let group = self
            .store
            .get_group(id)
            .await?
            .ok_or_else(|| Error::not_found("group", id))?;
        if group.creator != user {
            return Err(Error::NoAccess);
        }
        Ok(group)
    }

    async fn require_existing_user(&self, id: UserId) -> Result<()> {
        match self.store.get_user(id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found("user", id)),
        }
    }
}

fn checked_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Invalid("group name is required".to_string()));
    }
    Ok(name)
}
