use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[automock]
#[async_trait]
pub trait RateLimiter {
    /// Counts one request against `key` and reports whether it is allowed.
    async fn check(&self, key: &str) -> Result<bool>;
}
