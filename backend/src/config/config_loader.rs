use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};

use super::config_model::{
    BackendServer, Database, DotEnvyConfig, Polar, RateLimit, RateLimitBackend, Supabase,
};

const DEFAULT_WEBHOOK_MAX_RETRIES: u32 = 3;
const DEFAULT_WEBHOOK_INITIAL_BACKOFF_MS: u64 = 1_000;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| env::var(key).ok())
}

pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let backend_server = BackendServer {
        port: required_parsed(&lookup, "SERVER_PORT_BACKEND")?,
        body_limit: required_parsed(&lookup, "SERVER_BODY_LIMIT")?,
        timeout: required_parsed(&lookup, "SERVER_TIMEOUT")?,
    };
    backend_server.body_limit_bytes()?;

    let database = Database {
        url: required(&lookup, "DATABASE_URL")?,
    };

    let supabase = Supabase {
        jwt_secret: required(&lookup, "SUPABASE_JWT_SECRET")?,
    };

    let polar = Polar {
        webhook_secret: optional(&lookup, "POLAR_WEBHOOK_SECRET"),
        max_retries: optional_parsed(&lookup, "WEBHOOK_MAX_RETRIES")?
            .unwrap_or(DEFAULT_WEBHOOK_MAX_RETRIES),
        initial_backoff: Duration::from_millis(
            optional_parsed(&lookup, "WEBHOOK_INITIAL_BACKOFF_MS")?
                .unwrap_or(DEFAULT_WEBHOOK_INITIAL_BACKOFF_MS),
        ),
    };

    let backend = match optional(&lookup, "RATE_LIMIT_BACKEND").as_deref() {
        None | Some("memory") => RateLimitBackend::Memory,
        Some("postgres") => RateLimitBackend::Postgres,
        Some(other) => bail!("RATE_LIMIT_BACKEND must be `memory` or `postgres`, got `{other}`"),
    };

    let rate_limit = RateLimit {
        backend,
        max_requests: optional_parsed(&lookup, "RATE_LIMIT_MAX_REQUESTS")?
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
        window: Duration::from_secs(
            optional_parsed(&lookup, "RATE_LIMIT_WINDOW_SECS")?
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        ),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        polar,
        rate_limit,
    })
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).with_context(|| format!("{key} is missing"))
}

fn required_parsed<F, T>(lookup: &F, key: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = required(lookup, key)?;
    raw.parse::<T>()
        .with_context(|| format!("{key} is invalid (value: {raw})"))
}

fn optional_parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("{key} is invalid (value: {raw})"))
        })
        .transpose()
}
