use std::sync::Arc;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};

use crate::domain::UserView;
use crate::error::ApiResult;
use crate::middleware::{admin::admin_only, auth::require_auth};
use crate::service::directory;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // layers wrap outward: require_auth runs before admin_only
    Router::new()
        .route("/admin/users", get(list_users))
        .route_layer(from_fn(admin_only))
        .route_layer(from_fn_with_state(state, require_auth))
}

async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<UserView>>> {
    Ok(Json(directory::recent_users(state.store.as_ref()).await?))
}
