use std::sync::Arc;

use axum::{Extension, Json, Router, extract::State, routing::get};
use crates::domain::{
    repositories::{rate_limits::RateLimiter, subscriptions::SubscriptionRepository},
    value_objects::subscriptions::CurrentSubscriptionResponse,
};

use crate::{
    auth::{AuthUser, SupabaseJwt},
    usecases::subscriptions::{SubscriptionError, SubscriptionUseCase},
};

pub fn routes<S, R>(
    subscriptions_usecase: Arc<SubscriptionUseCase<S, R>>,
    jwt: Arc<SupabaseJwt>,
) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: RateLimiter + Send + Sync + 'static,
{
    Router::new()
        .route("/current", get(check_current_user_subscription::<S, R>))
        .with_state(subscriptions_usecase)
        .layer(Extension(jwt))
}

pub async fn check_current_user_subscription<S, R>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<S, R>>>,
    auth: AuthUser,
) -> Result<Json<CurrentSubscriptionResponse>, SubscriptionError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    R: RateLimiter + Send + Sync + 'static,
{
    let response = subscriptions_usecase
        .get_current_subscription(auth.user_id)
        .await?;
    Ok(Json(response))
}
