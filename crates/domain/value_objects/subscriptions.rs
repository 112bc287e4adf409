use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::enums::{
    plan_types::PlanType, subscription_statuses::SubscriptionStatus,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionDto {
    pub user_id: Uuid,
    pub external_customer_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub plan_type: PlanType,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            user_id: value.user_id,
            external_customer_id: value.external_customer_id,
            // Rows written outside the reconciler may hold other values.
            status: value.status.parse().ok(),
            plan_type: PlanType::from_db(&value.plan_type),
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionResponse {
    pub subscription: Option<SubscriptionDto>,
}
