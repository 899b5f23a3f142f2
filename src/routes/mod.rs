use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path,
    },
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

mod admin;
mod appointments;
mod auth;
mod doctors;
mod patients;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let api = Router::new()
        .merge(auth::router(state.clone()))
        .merge(appointments::router(state.clone()))
        .merge(doctors::router())
        .merge(patients::router(state.clone()))
        .merge(admin::router(state));
    Router::new().nest("/api", api)
}

/// Unwraps a JSON body, turning malformed input into a 400 with the usual
/// error shape.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidArgument(rejection.body_text()))
}

/// Same treatment for path parameters such as a non-numeric `:id`.
fn path_param<T>(param: Result<Path<T>, PathRejection>) -> ApiResult<T> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| ApiError::InvalidArgument(rejection.body_text()))
}
