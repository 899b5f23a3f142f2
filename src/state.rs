use std::sync::Arc;

use crate::config::AppConfig;
use crate::infra::Store;
use crate::middleware::rate_limit::RateLimiter;
use crate::security::jwt::JwtManager;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: JwtManager,
    pub auth_limiter: RateLimiter,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt: JwtManager, auth_limiter: RateLimiter) -> Arc<Self> {
        Arc::new(Self {
            store,
            jwt,
            auth_limiter,
        })
    }

    pub fn from_config(store: Arc<dyn Store>, config: &AppConfig) -> Arc<Self> {
        Self::new(
            store,
            JwtManager::new(config.jwt_secret.clone(), config.jwt_ttl),
            RateLimiter::new(config.auth_rate_limit, config.auth_rate_window_secs)
                .trusting_forwarded_for(config.trust_forwarded_for),
        )
    }
}
