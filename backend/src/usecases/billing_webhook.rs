use std::sync::Arc;

use axum::http::StatusCode;
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{
            billing_webhook::{StatusTransition, ValidatedWebhookEvent, WebhookPayloadError},
            enums::subscription_statuses::SubscriptionStatus,
        },
    },
    payments::polar_signature,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature: {0}")]
    Authentication(&'static str),
    #[error("webhook is not configured: {0}")]
    Configuration(&'static str),
    #[error("invalid webhook payload: {0}")]
    Validation(#[from] WebhookPayloadError),
    #[error("no subscription for customer {0}")]
    CustomerNotFound(String),
    #[error("subscription lookup failed")]
    Lookup(#[source] anyhow::Error),
    #[error("subscription update failed: {0}")]
    Transient(#[source] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Authentication(_) => StatusCode::UNAUTHORIZED,
            WebhookError::Validation(_) => StatusCode::BAD_REQUEST,
            WebhookError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
            WebhookError::Configuration(_)
            | WebhookError::Lookup(_)
            | WebhookError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        user_id: Uuid,
        status: SubscriptionStatus,
    },
    Ignored {
        event_type: String,
    },
}

pub struct BillingWebhookUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    webhook_secret: Option<String>,
    retry_policy: RetryPolicy,
}

impl<S> BillingWebhookUseCase<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        webhook_secret: Option<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            subscription_repo,
            webhook_secret,
            retry_policy,
        }
    }

    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        self.verify_signature(payload, signature)?;

        let event = ValidatedWebhookEvent::from_bytes(payload).map_err(|err| {
            warn!(
                error = %err,
                status = StatusCode::BAD_REQUEST.as_u16(),
                "billing_webhook: payload rejected"
            );
            WebhookError::Validation(err)
        })?;

        let target_status = StatusTransition::for_event_type(&event.event_type)
            .target_status(&event.status)
            .map_err(|err| {
                warn!(
                    event_type = %event.event_type,
                    customer_id = %event.customer_id,
                    error = %err,
                    "billing_webhook: unusable status on event"
                );
                WebhookError::Validation(err)
            })?;

        let Some(status) = target_status else {
            debug!(
                event_type = %event.event_type,
                customer_id = %event.customer_id,
                "billing_webhook: event type not handled; acknowledging"
            );
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        };

        let user_id = self.resolve_user_id(&event).await?;

        info!(
            event_type = %event.event_type,
            customer_id = %event.customer_id,
            subscription_id = ?event.provider_subscription_id,
            %user_id,
            status = %status,
            "billing_webhook: applying subscription status"
        );

        let repo = &self.subscription_repo;
        let customer_id = event.customer_id.as_str();
        self.retry_policy
            .run("subscription status upsert", move || {
                repo.upsert_status(user_id, customer_id, status)
            })
            .await
            .map_err(|err| {
                error!(
                    event_type = %event.event_type,
                    customer_id = %event.customer_id,
                    subscription_id = ?event.provider_subscription_id,
                    %user_id,
                    status = %status,
                    db_error = ?err,
                    "billing_webhook: subscription update failed after retries"
                );
                WebhookError::Transient(err)
            })?;

        info!(
            event_type = %event.event_type,
            %user_id,
            status = %status,
            "billing_webhook: subscription status applied"
        );

        Ok(WebhookOutcome::Applied { user_id, status })
    }

    fn verify_signature(&self, payload: &[u8], signature: Option<&str>) -> UseCaseResult<()> {
        let Some(secret) = self.webhook_secret.as_deref() else {
            error!("billing_webhook: POLAR_WEBHOOK_SECRET is not configured; rejecting webhook");
            return Err(WebhookError::Configuration("webhook secret is not set"));
        };

        let Some(signature) = signature.filter(|s| !s.trim().is_empty()) else {
            warn!(
                status = StatusCode::UNAUTHORIZED.as_u16(),
                "billing_webhook: signature header missing"
            );
            return Err(WebhookError::Authentication("missing signature"));
        };

        let valid = polar_signature::verify_signature(secret, payload, signature).map_err(|err| {
            error!(error = ?err, "billing_webhook: could not compute signature");
            WebhookError::Configuration("webhook secret is unusable")
        })?;

        if !valid {
            warn!(
                status = StatusCode::UNAUTHORIZED.as_u16(),
                payload_len = payload.len(),
                "billing_webhook: signature mismatch"
            );
            return Err(WebhookError::Authentication("signature mismatch"));
        }

        Ok(())
    }

    async fn resolve_user_id(&self, event: &ValidatedWebhookEvent) -> UseCaseResult<Uuid> {
        if let Some(user_id) = event.user_id {
            return Ok(user_id);
        }

        let subscription = self
            .subscription_repo
            .find_by_external_customer_id(&event.customer_id)
            .await
            .map_err(|err| {
                error!(
                    event_type = %event.event_type,
                    customer_id = %event.customer_id,
                    db_error = ?err,
                    "billing_webhook: failed to look up subscription by customer"
                );
                WebhookError::Lookup(err)
            })?;

        match subscription {
            Some(subscription) => Ok(subscription.user_id),
            None => {
                warn!(
                    event_type = %event.event_type,
                    customer_id = %event.customer_id,
                    status = StatusCode::NOT_FOUND.as_u16(),
                    "billing_webhook: no subscription for customer and no user_id on event"
                );
                Err(WebhookError::CustomerNotFound(event.customer_id.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use crates::domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::subscriptions::MockSubscriptionRepository,
    };
    use std::time::Duration;
    use tokio::time::Instant;

    const SECRET: &str = "whsec_test_secret";
    const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

    fn user_id() -> Uuid {
        Uuid::parse_str(USER_ID).unwrap()
    }

    fn usecase(repo: MockSubscriptionRepository) -> BillingWebhookUseCase<MockSubscriptionRepository> {
        BillingWebhookUseCase::new(Arc::new(repo), Some(SECRET.to_string()), RetryPolicy::default())
    }

    fn payload(event_type: &str, status: &str, user_id: Option<&str>) -> Vec<u8> {
        let mut object = serde_json::json!({
            "id": "sub_123",
            "customer_id": "cus_123",
            "status": status,
        });
        if let Some(user_id) = user_id {
            object["user_id"] = serde_json::Value::String(user_id.to_string());
        }
        serde_json::to_vec(&serde_json::json!({ "type": event_type, "data": { "object": object } }))
            .unwrap()
    }

    fn sign(body: &[u8]) -> String {
        polar_signature::sign_payload(SECRET, body).unwrap()
    }

    fn expect_upsert(
        repo: &mut MockSubscriptionRepository,
        expected_status: SubscriptionStatus,
        times: usize,
    ) {
        let expected_user = user_id();
        repo.expect_upsert_status()
            .withf(move |user_id, customer_id, status| {
                *user_id == expected_user && customer_id == "cus_123" && *status == expected_status
            })
            .times(times)
            .returning(|_, _, _| Ok(()));
    }

    fn stored_subscription() -> SubscriptionEntity {
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: user_id(),
            external_customer_id: Some("cus_123".to_string()),
            status: "active".to_string(),
            plan_type: "pro".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn accepts_signature_with_or_without_prefix() {
        let mut repo = MockSubscriptionRepository::new();
        expect_upsert(&mut repo, SubscriptionStatus::Active, 2);
        let usecase = usecase(repo);
        let body = payload("subscription.created", "active", Some(USER_ID));
        let digest = sign(&body);

        for signature in [digest.clone(), format!("sha256={digest}")] {
            let outcome = usecase.handle_webhook(&body, Some(&signature)).await.unwrap();
            assert_eq!(
                outcome,
                WebhookOutcome::Applied {
                    user_id: user_id(),
                    status: SubscriptionStatus::Active
                }
            );
        }
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected_before_persistence() {
        // No expectations: any repository call panics.
        let usecase = usecase(MockSubscriptionRepository::new());
        let body = payload("subscription.created", "active", Some(USER_ID));
        let signature = polar_signature::sign_payload("attacker_secret", &body).unwrap();

        let err = usecase.handle_webhook(&body, Some(&signature)).await.unwrap_err();

        assert!(matches!(err, WebhookError::Authentication(_)));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_signature_is_an_authentication_error() {
        let usecase = usecase(MockSubscriptionRepository::new());
        let body = payload("subscription.created", "active", Some(USER_ID));

        let err = usecase.handle_webhook(&body, None).await.unwrap_err();

        assert!(matches!(err, WebhookError::Authentication("missing signature")));
    }

    #[tokio::test]
    async fn missing_secret_is_a_configuration_error() {
        let usecase = BillingWebhookUseCase::new(
            Arc::new(MockSubscriptionRepository::new()),
            None,
            RetryPolicy::default(),
        );
        let body = payload("subscription.created", "active", Some(USER_ID));

        let err = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap_err();

        assert!(matches!(err, WebhookError::Configuration(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let mut repo = MockSubscriptionRepository::new();
        expect_upsert(&mut repo, SubscriptionStatus::Active, 2);
        let usecase = usecase(repo);
        let body = payload("subscription.activated", "active", Some(USER_ID));
        let signature = sign(&body);

        let first = usecase.handle_webhook(&body, Some(&signature)).await.unwrap();
        let second = usecase.handle_webhook(&body, Some(&signature)).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cancelled_event_type_wins_over_embedded_status() {
        let mut repo = MockSubscriptionRepository::new();
        expect_upsert(&mut repo, SubscriptionStatus::Canceled, 1);
        let usecase = usecase(repo);
        let body = payload("subscription.cancelled", "active", Some(USER_ID));

        let outcome = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                user_id: user_id(),
                status: SubscriptionStatus::Canceled
            }
        );
    }

    #[tokio::test]
    async fn updated_event_uses_embedded_status() {
        let mut repo = MockSubscriptionRepository::new();
        expect_upsert(&mut repo, SubscriptionStatus::PastDue, 1);
        let usecase = usecase(repo);
        let body = payload("subscription.updated", "past_due", Some(USER_ID));

        let outcome = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                user_id: user_id(),
                status: SubscriptionStatus::PastDue
            }
        );
    }

    #[tokio::test]
    async fn updated_event_with_unknown_status_is_rejected() {
        let usecase = usecase(MockSubscriptionRepository::new());
        let body = payload("subscription.updated", "trialing", Some(USER_ID));

        let err = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unrecognised_event_type_is_acknowledged_without_persistence() {
        let usecase = usecase(MockSubscriptionRepository::new());
        let body = payload("subscription.weird_event", "active", None);

        let outcome = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "subscription.weird_event".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_customer_id_is_rejected_without_persistence() {
        let usecase = usecase(MockSubscriptionRepository::new());
        let body = br#"{"type":"subscription.created","data":{"object":{"status":"active"}}}"#;

        let err = usecase.handle_webhook(body, Some(&sign(body))).await.unwrap_err();

        assert!(matches!(
            err,
            WebhookError::Validation(WebhookPayloadError::MissingCustomerId)
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let usecase = usecase(MockSubscriptionRepository::new());
        let body = b"{\"type\": ";

        let err = usecase.handle_webhook(body, Some(&sign(body))).await.unwrap_err();

        assert!(matches!(
            err,
            WebhookError::Validation(WebhookPayloadError::MalformedJson(_))
        ));
    }

    #[tokio::test]
    async fn resolves_user_through_customer_id() {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_by_external_customer_id()
            .withf(|customer_id| customer_id == "cus_123")
            .times(1)
            .returning(|_| Ok(Some(stored_subscription())));
        expect_upsert(&mut repo, SubscriptionStatus::PastDue, 1);
        let usecase = usecase(repo);
        let body = payload("subscription.past_due", "past_due", None);

        let outcome = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                user_id: user_id(),
                status: SubscriptionStatus::PastDue
            }
        );
    }

    #[tokio::test]
    async fn unknown_customer_without_user_id_is_not_found() {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_by_external_customer_id()
            .times(1)
            .returning(|_| Ok(None));
        let usecase = usecase(repo);
        let body = payload("subscription.created", "active", None);

        let err = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap_err();

        assert!(matches!(err, WebhookError::CustomerNotFound(ref id) if id == "cus_123"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let mut repo = MockSubscriptionRepository::new();
        let mut calls = 0;
        repo.expect_upsert_status()
            .times(3)
            .returning(move |_, _, _| {
                calls += 1;
                if calls <= 2 {
                    Err(anyhow!("connection reset by peer"))
                } else {
                    Ok(())
                }
            });
        let usecase = usecase(repo);
        let body = payload("subscription.created", "active", Some(USER_ID));
        let started = Instant::now();

        let outcome = usecase.handle_webhook(&body, Some(&sign(&body))).await;

        assert!(outcome.is_ok());
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3_050),
            "elapsed {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let mut repo = MockSubscriptionRepository::new();
        let mut calls = 0;
        repo.expect_upsert_status()
            .times(4)
            .returning(move |_, _, _| {
                calls += 1;
                Err(anyhow!("write failed on attempt {calls}"))
            });
        let usecase = usecase(repo);
        let body = payload("subscription.created", "active", Some(USER_ID));

        let err = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            WebhookError::Transient(source) => {
                assert_eq!(source.to_string(), "write failed on attempt 4")
            }
            other => panic!("expected transient error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lookup_failure_is_not_retried() {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_by_external_customer_id()
            .times(1)
            .returning(|_| Err(anyhow!("pool timed out")));
        let usecase = usecase(repo);
        let body = payload("subscription.created", "active", None);

        let err = usecase.handle_webhook(&body, Some(&sign(&body))).await.unwrap_err();

        assert!(matches!(err, WebhookError::Lookup(_)));
    }
}
