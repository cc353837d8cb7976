use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::models::Actor;
use crate::Error;

/// Resolves the request's [`Actor`] and adds it to the request extensions.
///
/// A request without an `Authorization` header is anonymous. A header that
/// is not a valid bearer token is rejected outright rather than downgraded.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default());

    let actor = match auth_header {
        None => Actor::Anonymous,
        Some(h) => {
            let Some(token) = h.strip_prefix("Bearer ") else {
                return Error::Unauthenticated.into_response();
            };
            match state.users.authenticate(token.trim()).await {
                Ok(user) => Actor::User(user),
                Err(e) => return e.into_response(),
            }
        }
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}
