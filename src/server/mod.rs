//! HTTP API.
//!
//! # Endpoints
//!
//! - `GET /health`, `POST /register`, `POST /login`: no auth
//! - `GET|PUT /users/me`: auth required
//! - `GET|POST /docs`, `GET|PUT|DELETE /docs/{id}`,
//!   `POST /docs/{id}/access`, `POST /docs/{id}/inspection`
//! - `POST /groups`, `PUT|DELETE /groups/{id}`,
//!   `GET|PUT /groups/{id}/members`, `DELETE /groups/{id}/members/{member_id}`
//!
//! Everything except the first group accepts an optional
//! `Authorization: Bearer <token>` header; requests without one act as the
//! anonymous user.

mod auth;
mod documents;
mod error;
mod extract;
mod groups;
mod users;

pub use auth::auth_middleware;
pub use error::ErrorBody;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::TokenIssuer;
use crate::pipeline::InspectionQueue;
use crate::service::{DocumentService, GroupService, UserService};
use crate::store::Store;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub groups: GroupService,
    pub users: UserService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, queue: InspectionQueue, tokens: TokenIssuer) -> Self {
        Self {
            documents: Arc::new(DocumentService::new(store.clone(), queue)),
            groups: GroupService::new(store.clone()),
            users: UserService::new(store, tokens),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(users::health))
        .route("/register", post(users::register))
        .route("/login", post(users::login));

    let api_routes = Router::new()
        .route("/users/me", get(users::me).put(users::edit_me))
        .route("/docs", get(documents::list).post(documents::create))
        .route(
            "/docs/{id}",
            get(documents::get)
                .put(documents::edit)
                .delete(documents::delete),
        )
        .route("/docs/{id}/access", post(documents::change_access))
        .route("/docs/{id}/inspection", post(documents::launch_inspection))
        .route("/groups", post(groups::create))
        .route("/groups/{id}", put(groups::rename).delete(groups::delete))
        .route(
            "/groups/{id}/members",
            get(groups::members).put(groups::add_member),
        )
        .route(
            "/groups/{id}/members/{member_id}",
            axum::routing::delete(groups::remove_member),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
