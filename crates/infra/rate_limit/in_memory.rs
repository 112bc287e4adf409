use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::domain::repositories::rate_limits::RateLimiter;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Process-local limiter. Counts are not shared between instances; use
/// `PostgresRateLimiter` when running more than one.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<bool> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        windows.retain(|_, window| window.reset_at > now);

        let window = windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            reset_at: now + self.window,
        });

        if window.count >= self.max_requests {
            return Ok(false);
        }

        window.count += 1;
        Ok(true)
    }
}
