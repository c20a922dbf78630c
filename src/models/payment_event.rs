use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment gateway webhook event that has already been applied
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentEvent {
    pub id: String,
    pub event_type: String,
    pub payment_intent_id: Option<String>,
    pub received_at: NaiveDateTime,
}
