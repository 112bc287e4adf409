use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    repositories::{rate_limits::RateLimiter, subscriptions::SubscriptionRepository},
    value_objects::subscriptions::{CurrentSubscriptionResponse, SubscriptionDto},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("too many requests")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<S, R>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: RateLimiter + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    rate_limiter: Arc<R>,
}

impl<S, R> SubscriptionUseCase<S, R>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: RateLimiter + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, rate_limiter: Arc<R>) -> Self {
        Self {
            subscription_repo,
            rate_limiter,
        }
    }

    pub async fn get_current_subscription(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<CurrentSubscriptionResponse> {
        let key = format!("subscriptions:current:{user_id}");
        let allowed = self.rate_limiter.check(&key).await.map_err(|err| {
            error!(%user_id, error = ?err, "subscriptions: rate limiter unavailable");
            SubscriptionError::Internal(err)
        })?;
        if !allowed {
            warn!(
                %user_id,
                status = StatusCode::TOO_MANY_REQUESTS.as_u16(),
                "subscriptions: rate limit exceeded"
            );
            return Err(SubscriptionError::RateLimited);
        }

        info!(%user_id, "subscriptions: loading current subscription for user");
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "subscriptions: failed to load current subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        if subscription.is_none() {
            info!(%user_id, "subscriptions: no subscription on record");
        }

        Ok(CurrentSubscriptionResponse {
            subscription: subscription.map(SubscriptionDto::from),
        })
    }
}
