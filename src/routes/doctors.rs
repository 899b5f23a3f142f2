use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::get,
    Json, Router,
};

use super::path_param;
use crate::domain::Doctor;
use crate::error::ApiResult;
use crate::service::directory;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/doctors", get(list))
        .route("/doctors/:id", get(by_id))
}

async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Doctor>>> {
    Ok(Json(directory::list_doctors(state.store.as_ref()).await?))
}

async fn by_id(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Doctor>> {
    let id = path_param(id)?;
    Ok(Json(directory::get_doctor(state.store.as_ref(), id).await?))
}
