use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::rate_limits;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = rate_limits, primary_key(key))]
pub struct RateLimitEntity {
    pub key: String,
    pub count: i32,
    pub window_reset_at: DateTime<Utc>,
}
