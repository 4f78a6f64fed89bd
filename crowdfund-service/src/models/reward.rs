use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Reward tier. Read-only from the donation flow: its `amount` is the
/// minimum donation that may claim it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reward {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub requires_shipping: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
