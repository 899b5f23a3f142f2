use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};

use super::json_body;
use crate::domain::{Identity, Patient, PatientUpdate};
use crate::error::ApiResult;
use crate::middleware::auth::require_auth;
use crate::service::directory;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/patients/profile", get(profile).put(update_profile))
        .route_layer(from_fn_with_state(state, require_auth))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(directory::patient_profile(state.store.as_ref(), &who).await?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(who): Extension<Identity>,
    payload: Result<Json<PatientUpdate>, JsonRejection>,
) -> ApiResult<Json<Patient>> {
    let update = json_body(payload)?;
    Ok(Json(
        directory::update_patient_profile(state.store.as_ref(), &who, update).await?,
    ))
}
