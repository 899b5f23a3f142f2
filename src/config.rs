use std::net::SocketAddr;

use anyhow::Context;
use time::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub auth_rate_limit: u32,
    pub auth_rate_window_secs: u64,
    /// Key the auth rate limit on `X-Forwarded-For` instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    /// Bootstrap admin created at start-up when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_string("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:9091".into())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let store = match env_string("STORE").map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("postgres") | Some("pg") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!("unknown STORE {other:?}; expected postgres or memory"),
        };
        let database_url = env_string("DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL missing. Set DATABASE_URL or STORE=memory.");
        }

        let jwt_secret = env_string("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using the development secret");
            DEV_JWT_SECRET.into()
        });
        let jwt_ttl = Duration::minutes(env_parse("JWT_TTL_MINUTES")?.unwrap_or(600));

        let admin_email = env_string("ADMIN_EMAIL");
        let admin_password = env_string("ADMIN_PASSWORD");
        if admin_email.is_some() != admin_password.is_some() {
            anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together");
        }

        Ok(AppConfig {
            bind_addr,
            store,
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?.unwrap_or(5),
            jwt_secret,
            jwt_ttl,
            auth_rate_limit: env_parse("AUTH_RATE_LIMIT")?.unwrap_or(30),
            auth_rate_window_secs: env_parse("AUTH_RATE_WINDOW_SECS")?.unwrap_or(60),
            trust_forwarded_for: env_bool("TRUST_FORWARDED_FOR").unwrap_or(false),
            admin_email,
            admin_password,
        })
    }

    /// In-memory configuration for tests and local runs.
    pub fn in_memory() -> Self {
        AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9091)),
            store: StoreKind::Memory,
            database_url: None,
            database_max_connections: 1,
            jwt_secret: DEV_JWT_SECRET.into(),
            jwt_ttl: Duration::minutes(600),
            auth_rate_limit: 30,
            auth_rate_window_secs: 60,
            trust_forwarded_for: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    let value = env_string(key)?;
    match parse_bool(&value) {
        Some(b) => Some(b),
        None => {
            warn!(%key, %value, "ignoring unrecognised boolean");
            None
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_string(key)
        .map(|v| v.parse::<T>().with_context(|| format!("{key} is not valid: {v:?}")))
        .transpose()
}
