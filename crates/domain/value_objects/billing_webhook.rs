use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

// Polar subscription webhook as delivered on the wire. Every field is optional so
// that a missing field is reported by name instead of as a generic parse failure.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PolarWebhookPayload {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub data: Option<PolarWebhookData>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PolarWebhookData {
    pub object: Option<PolarSubscriptionObject>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PolarSubscriptionObject {
    pub id: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookPayloadError {
    #[error("malformed JSON payload: {0}")]
    MalformedJson(String),
    #[error("missing event type")]
    MissingType,
    #[error("missing data.object")]
    MissingObject,
    #[error("missing customer_id")]
    MissingCustomerId,
    #[error("missing status")]
    MissingStatus,
    #[error("user_id is not a valid UUID: {0}")]
    InvalidUserId(String),
    #[error("unsupported subscription status: {0}")]
    UnsupportedStatus(String),
}

/// A webhook whose required fields are all present. The user is still unresolved
/// when `user_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedWebhookEvent {
    pub event_type: String,
    pub provider_subscription_id: Option<String>,
    pub customer_id: String,
    pub status: String,
    pub user_id: Option<Uuid>,
}

impl ValidatedWebhookEvent {
    pub fn from_bytes(payload: &[u8]) -> Result<Self, WebhookPayloadError> {
        let payload: PolarWebhookPayload = serde_json::from_slice(payload)
            .map_err(|err| WebhookPayloadError::MalformedJson(err.to_string()))?;
        payload.validate()
    }
}

impl PolarWebhookPayload {
    pub fn validate(self) -> Result<ValidatedWebhookEvent, WebhookPayloadError> {
        let event_type = non_empty(self.type_).ok_or(WebhookPayloadError::MissingType)?;
        let object = self
            .data
            .and_then(|data| data.object)
            .ok_or(WebhookPayloadError::MissingObject)?;

        let customer_id =
            non_empty(object.customer_id).ok_or(WebhookPayloadError::MissingCustomerId)?;
        let status = non_empty(object.status).ok_or(WebhookPayloadError::MissingStatus)?;

        let user_id = match non_empty(object.user_id) {
            Some(raw) => Some(
                Uuid::parse_str(&raw).map_err(|_| WebhookPayloadError::InvalidUserId(raw))?,
            ),
            None => None,
        };

        Ok(ValidatedWebhookEvent {
            event_type,
            provider_subscription_id: non_empty(object.id),
            customer_id,
            status,
            user_id,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// What a given event type does to the subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The event type alone decides the new status.
    Fixed(SubscriptionStatus),
    /// The status carried inside the event is authoritative.
    FromPayload,
    /// Acknowledged but not acted on.
    Ignore,
}

impl StatusTransition {
    pub fn for_event_type(event_type: &str) -> Self {
        match event_type {
            "subscription.created" | "subscription.activated" => {
                StatusTransition::Fixed(SubscriptionStatus::Active)
            }
            "subscription.cancelled" | "subscription.canceled" => {
                StatusTransition::Fixed(SubscriptionStatus::Canceled)
            }
            "subscription.past_due" => StatusTransition::Fixed(SubscriptionStatus::PastDue),
            "subscription.updated" => StatusTransition::FromPayload,
            _ => StatusTransition::Ignore,
        }
    }

    /// Target status for this transition, `None` for ignored events.
    pub fn target_status(
        self,
        payload_status: &str,
    ) -> Result<Option<SubscriptionStatus>, WebhookPayloadError> {
        match self {
            StatusTransition::Fixed(status) => Ok(Some(status)),
            StatusTransition::FromPayload => payload_status
                .parse::<SubscriptionStatus>()
                .map(Some)
                .map_err(|err| WebhookPayloadError::UnsupportedStatus(err.0)),
            StatusTransition::Ignore => Ok(None),
        }
    }
}
