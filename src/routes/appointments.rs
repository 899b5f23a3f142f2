use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};

use super::{json_body, path_param};
use crate::domain::{Appointment, Identity};
use crate::error::ApiResult;
use crate::middleware::auth::require_auth;
use crate::service::appointments::{self, BookRequest, StatusUpdate};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/appointments/book", post(book))
        .route("/appointments/patient", get(for_patient))
        .route("/appointments/doctor", get(for_doctor))
        .route("/appointments/:id/status", put(update_status))
        .route_layer(from_fn_with_state(state, require_auth))
}

async fn book(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> ApiResult<Json<Appointment>> {
    let req = json_body(payload)?;
    Ok(Json(appointments::book(state.store.as_ref(), &who, req).await?))
}

async fn for_patient(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
) -> ApiResult<Json<Vec<Appointment>>> {
    Ok(Json(appointments::list_for_patient(state.store.as_ref(), &who).await?))
}

async fn for_doctor(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
) -> ApiResult<Json<Vec<Appointment>>> {
    Ok(Json(appointments::list_for_doctor(state.store.as_ref(), &who).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<Appointment>> {
    let id = path_param(id)?;
    let update = json_body(payload)?;
    Ok(Json(
        appointments::update_status(state.store.as_ref(), &who, id, update).await?,
    ))
}
