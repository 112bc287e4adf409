use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::enums::{plan_types::PlanType, subscription_statuses::SubscriptionStatus},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// A stored customer id is never replaced; the incoming one only fills a gap.
fn retained_customer_id(stored: Option<String>, incoming: &str) -> String {
    stored.unwrap_or_else(|| incoming.to_string())
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_external_customer_id(
        &self,
        external_customer_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::external_customer_id.eq(external_customer_id))
            .order(subscriptions::updated_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_status(
        &self,
        user_id: Uuid,
        external_customer_id: &str,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let existing = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .select(subscriptions::external_customer_id)
                .for_update()
                .first::<Option<String>>(conn)
                .optional()?;

            match existing {
                Some(stored_customer_id) => {
                    let customer_id =
                        retained_customer_id(stored_customer_id, external_customer_id);

                    update(subscriptions::table.filter(subscriptions::user_id.eq(user_id)))
                        .set((
                            subscriptions::status.eq(status.to_string()),
                            subscriptions::external_customer_id.eq(Some(customer_id)),
                            subscriptions::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)?;
                }
                None => {
                    let insert_entity = InsertSubscriptionEntity {
                        user_id,
                        external_customer_id: Some(external_customer_id.to_string()),
                        status: status.to_string(),
                        plan_type: PlanType::Pro.to_string(),
                    };

                    insert_into(subscriptions::table)
                        .values(&insert_entity)
                        .execute(conn)?;
                }
            }

            Ok(())
        })?;

        Ok(())
    }
}
