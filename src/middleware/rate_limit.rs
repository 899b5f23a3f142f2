use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

struct Bucket {
    count: u32,
    window_start: Instant,
}

const PRUNE_EVERY: u64 = 256;

/// Fixed-window counter keyed by client and path.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    max_requests: u32,
    window: Duration,
    trust_forwarded_for: bool,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            buckets: DashMap::new(),
            max_requests,
            window: Duration::from_secs(window_secs),
            trust_forwarded_for: false,
            checks: AtomicU64::new(0),
        }
    }

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Counts one request for `key`; false once the window is exhausted.
    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }

        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            window_start: Instant::now(),
        });

        if entry.window_start.elapsed() > self.window {
            entry.count = 0;
            entry.window_start = Instant::now();
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drops buckets whose window has passed.
    pub fn prune(&self) {
        let window = self.window;
        self.buckets.retain(|_, b| b.window_start.elapsed() <= window);
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    fn client_key(&self, req: &Request) -> String {
        let forwarded = if self.trust_forwarded_for {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        } else {
            None
        };
        forwarded
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".into())
    }
}

pub async fn limit_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limiter = &state.auth_limiter;
    let key = format!("{}:{}", limiter.client_key(&req), req.uri().path());
    if !limiter.check(&key) {
        warn!(%key, "rate limited");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_per_key() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check("1.1.1.1:/api/auth/login"));
        assert!(limiter.check("1.1.1.1:/api/auth/login"));
        assert!(!limiter.check("1.1.1.1:/api/auth/login"));
        assert!(limiter.check("2.2.2.2:/api/auth/login"));
    }

    fn request(forwarded: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/auth/login");
        if let Some(v) = forwarded {
            builder = builder.header("x-forwarded-for", v);
        }
        let mut req = builder.body(axum::body::Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 40000))));
        req
    }

    #[test]
    fn peer_address_wins_unless_forwarded_is_trusted() {
        let limiter = RateLimiter::new(2, 60);
        assert_eq!(limiter.client_key(&request(Some("1.2.3.4"))), "10.0.0.7");
        assert_eq!(limiter.client_key(&request(None)), "10.0.0.7");

        let behind_proxy = RateLimiter::new(2, 60).trusting_forwarded_for(true);
        assert_eq!(behind_proxy.client_key(&request(Some("1.2.3.4, 10.0.0.1"))), "1.2.3.4");
        assert_eq!(behind_proxy.client_key(&request(None)), "10.0.0.7");
    }

    #[test]
    fn expired_buckets_are_evicted() {
        let limiter = RateLimiter::new(5, 0);
        for i in 0..10 {
            limiter.check(&format!("client-{i}"));
        }
        assert_eq!(limiter.tracked_keys(), 10);
        std::thread::sleep(Duration::from_millis(5));
        limiter.prune();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn pruning_runs_during_checks() {
        let limiter = RateLimiter::new(5, 0);
        for i in 0..PRUNE_EVERY - 1 {
            limiter.check(&format!("client-{i}"));
        }
        std::thread::sleep(Duration::from_millis(5));
        limiter.check("last");
        assert!(limiter.tracked_keys() <= 1);
    }

    #[test]
    fn live_buckets_survive_pruning() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check("k"));
        limiter.prune();
        assert!(!limiter.check("k"));
    }

    #[test]
    fn window_resets() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check("k"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("k"));
    }
}
