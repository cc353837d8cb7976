use axum::{extract::State, http::StatusCode, Extension};
use serde::Deserialize;

use super::extract::{Json, Path, Query};
use super::AppState;
use crate::models::{Actor, Group, GroupDraft, GroupId, MemberRequest, User, UserId};
use crate::Result;

const DEFAULT_PAGE: usize = 50;
const MAX_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(draft): Json<GroupDraft>,
) -> Result<(StatusCode, Json<Group>)> {
    let group = state.groups.create(actor, draft).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn rename(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<GroupId>,
    Json(draft): Json<GroupDraft>,
) -> Result<Json<Group>> {
    Ok(Json(state.groups.rename(actor, id, draft).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<GroupId>,
) -> Result<StatusCode> {
    state.groups.delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<GroupId>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<User>>> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    Ok(Json(state.groups.members(actor, id, page.offset, limit).await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<GroupId>,
    Json(request): Json<MemberRequest>,
) -> Result<StatusCode> {
    state.groups.add_member(actor, id, request.member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((id, member)): Path<(GroupId, UserId)>,
) -> Result<StatusCode> {
    state.groups.remove_member(actor, id, member).await?;
    Ok(StatusCode::NO_CONTENT)
}
