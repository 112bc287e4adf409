use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use crates::{
    domain::repositories::subscriptions::SubscriptionRepository,
    payments::polar_signature::SIGNATURE_HEADERS,
};
use serde_json::{Value, json};

use crate::{
    axum_http::error_responses::method_not_allowed,
    usecases::billing_webhook::{BillingWebhookUseCase, WebhookError},
};

pub fn routes<S>(billing_webhook_usecase: Arc<BillingWebhookUseCase<S>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/polar",
            post(polar_webhook::<S>).fallback(method_not_allowed),
        )
        .with_state(billing_webhook_usecase)
}

/// First signature header present, in provider preference order.
fn signature_header(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

pub async fn polar_webhook<S>(
    State(billing_webhook_usecase): State<Arc<BillingWebhookUseCase<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    billing_webhook_usecase
        .handle_webhook(&body, signature_header(&headers))
        .await?;

    Ok(Json(json!({ "received": true })))
}
