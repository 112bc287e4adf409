use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_external_customer_id(
        &self,
        external_customer_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Sets `status` on the row owned by `user_id`, creating the row when absent.
    /// An already stored `external_customer_id` is never replaced.
    async fn upsert_status(
        &self,
        user_id: Uuid,
        external_customer_id: &str,
        status: SubscriptionStatus,
    ) -> Result<()>;
}
