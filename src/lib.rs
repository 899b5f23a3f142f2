//! Hospital management backend: accounts, doctor and patient profiles, and
//! appointment booking over a JSON HTTP API.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod service;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::{AppConfig, StoreKind};
use infra::{MemoryStore, PgStore, Store};
use state::AppState;

/// Opens the configured store and builds the shared state around it.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn Store> = match config.store {
        StoreKind::Postgres => {
            let db = infra::db::connect(config).await?;
            infra::db::ensure_schema(&db).await?;
            Arc::new(PgStore::new(db))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        service::auth::ensure_admin(store.as_ref(), email, password).await?;
    }
    Ok(AppState::from_config(store, config))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::router(state.clone()))
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
