use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use time::OffsetDateTime;

use super::json_body;
use crate::domain::{Identity, UserView};
use crate::error::ApiResult;
use crate::middleware::{
    auth::{bearer_from_header, require_auth},
    rate_limit::limit_auth,
};
use crate::service::auth::{self, LoginRequest, LoginResponse, RegisterRequest, TokenValidation};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let limited = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route_layer(from_fn_with_state(state.clone(), limit_auth));
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route_layer(from_fn_with_state(state, require_auth));

    Router::new()
        .merge(limited)
        .merge(protected)
        .route("/auth/validate", get(validate))
}

async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let req = json_body(payload)?;
    Ok(Json(auth::login(state.store.as_ref(), &state.jwt, req).await?))
}

async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<UserView>> {
    let req = json_body(payload)?;
    // registration is public; a token only matters for creating admins
    let caller = match bearer_from_header(&headers) {
        Some(token) => auth::authenticate(state.store.as_ref(), &state.jwt, &token).await.ok(),
        None => None,
    };
    let today = OffsetDateTime::now_utc().date();
    Ok(Json(
        auth::register(state.store.as_ref(), req, today, caller.as_ref()).await?,
    ))
}

async fn validate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<TokenValidation>) {
    let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let result = auth::validate_token(state.store.as_ref(), &state.jwt, authorization).await;
    let status = if result.valid {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (status, Json(result))
}

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
) -> ApiResult<Json<UserView>> {
    Ok(Json(auth::me(state.store.as_ref(), &who).await?))
}
