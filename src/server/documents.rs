use axum::{extract::State, http::StatusCode, Extension};

use super::extract::{Json, Path};
use super::AppState;
use crate::models::{AccessChangeRequest, Actor, DocId, Document, DocumentDraft, DocumentUpdate};
use crate::Result;

/// Documents owned by the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.documents.list_documents(actor).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(draft): Json<DocumentDraft>,
) -> Result<(StatusCode, Json<Document>)> {
    let doc = state.documents.create(actor, draft).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<DocId>,
) -> Result<Json<Document>> {
    Ok(Json(state.documents.get(actor, id).await?))
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<DocId>,
    Json(update): Json<DocumentUpdate>,
) -> Result<Json<Document>> {
    Ok(Json(state.documents.edit(actor, id, update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<DocId>,
) -> Result<StatusCode> {
    state.documents.delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_access(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<DocId>,
    Json(request): Json<AccessChangeRequest>,
) -> Result<Json<Document>> {
    Ok(Json(state.documents.change_access(actor, id, request).await?))
}

/// Queues the document for inspection; the result shows up in its lint status later.
pub async fn launch_inspection(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<DocId>,
) -> Result<StatusCode> {
    state.documents.launch_inspection(actor, id).await?;
    Ok(StatusCode::ACCEPTED)
}
