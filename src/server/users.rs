use axum::{extract::State, http::StatusCode, Extension};
use serde::Serialize;

use super::extract::Json;
use super::AppState;
use crate::models::{Actor, LoginRequest, LoginResponse, User, UserUpdate};
use crate::service::require_user;
use crate::Result;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.users.register(&request.login, &request.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    Ok(Json(state.users.login(&request).await?))
}

/// Current user (auth required)
pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<User>> {
    let id = require_user(actor)?;
    Ok(Json(state.users.get_user(id).await?))
}

pub async fn edit_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>> {
    let id = require_user(actor)?;
    Ok(Json(state.users.edit_user(actor, id, update).await?))
}
