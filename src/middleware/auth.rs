use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::security::jwt::strip_bearer;
use crate::service::auth::authenticate;
use crate::state::AppState;

/// Rejects the request with 401 unless it carries a valid bearer token for
/// an existing user. On success the caller's `Identity` is put into the
/// request extensions.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_from_header(req.headers()).ok_or(ApiError::Unauthorized)?;
    let identity = authenticate(state.store.as_ref(), &state.jwt, &token).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

pub fn bearer_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(strip_bearer)
        .map(|s| s.to_string())
}
