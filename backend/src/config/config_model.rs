use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub polar: Polar,
    pub rate_limit: RateLimit,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

impl BackendServer {
    pub fn body_limit_bytes(&self) -> Result<usize> {
        self.body_limit
            .checked_mul(1024 * 1024)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .with_context(|| format!("SERVER_BODY_LIMIT is too large (value: {})", self.body_limit))
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Polar {
    /// Absent in a misconfigured deployment; each webhook then fails with a
    /// configuration error instead of the server refusing to start.
    pub webhook_secret: Option<String>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct RateLimit {
    pub backend: RateLimitBackend,
    pub max_requests: u32,
    pub window: Duration,
}
