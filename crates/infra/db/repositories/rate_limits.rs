use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::{sync::Arc, time::Duration};

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::rate_limits},
};
use domain::{entities::rate_limits::RateLimitEntity, repositories::rate_limits::RateLimiter};

/// Rate limiter whose counters live in Postgres, so every instance behind the
/// load balancer sees the same windows.
pub struct PostgresRateLimiter {
    db_pool: Arc<PgPoolSquad>,
    max_requests: i32,
    window: Duration,
}

impl PostgresRateLimiter {
    pub fn new(db_pool: Arc<PgPoolSquad>, max_requests: u32, window: Duration) -> Self {
        Self {
            db_pool,
            max_requests: i32::try_from(max_requests).unwrap_or(i32::MAX),
            window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowDecision {
    /// The stored window has expired; start a new one at count 1.
    Reset,
    Increment,
    Deny,
}

fn decide_window(
    current: &RateLimitEntity,
    now: DateTime<Utc>,
    max_requests: i32,
) -> WindowDecision {
    if current.window_reset_at <= now {
        WindowDecision::Reset
    } else if current.count >= max_requests {
        WindowDecision::Deny
    } else {
        WindowDecision::Increment
    }
}

#[async_trait]
impl RateLimiter for PostgresRateLimiter {
    async fn check(&self, key: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let window = chrono::Duration::from_std(self.window)?;
        let max_requests = self.max_requests;

        let allowed = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let now = Utc::now();

            // Lazy sweep of windows nobody has touched since they expired.
            delete(
                rate_limits::table
                    .filter(rate_limits::window_reset_at.le(now))
                    .filter(rate_limits::key.ne(key)),
            )
            .execute(conn)?;

            insert_into(rate_limits::table)
                .values(&RateLimitEntity {
                    key: key.to_string(),
                    count: 0,
                    window_reset_at: now + window,
                })
                .on_conflict(rate_limits::key)
                .do_nothing()
                .execute(conn)?;

            let current = rate_limits::table
                .find(key)
                .select(RateLimitEntity::as_select())
                .for_update()
                .first::<RateLimitEntity>(conn)?;

            match decide_window(&current, now, max_requests) {
                WindowDecision::Reset => {
                    update(rate_limits::table.find(key))
                        .set((
                            rate_limits::count.eq(1),
                            rate_limits::window_reset_at.eq(now + window),
                        ))
                        .execute(conn)?;
                    Ok(true)
                }
                WindowDecision::Deny => Ok(false),
                WindowDecision::Increment => {
                    update(rate_limits::table.find(key))
                        .set(rate_limits::count.eq(rate_limits::count + 1))
                        .execute(conn)?;
                    Ok(true)
                }
            }
        })?;

        Ok(allowed)
    }
}
