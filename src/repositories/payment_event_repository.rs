use crate::models::PaymentEvent;
use sqlx::{PgPool, Result as SqlxResult};

/// Ledger of processed payment webhook events
pub struct PaymentEventRepository {
    pool: PgPool,
}

impl PaymentEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an event id. Returns false when it was already recorded.
    pub async fn record(
        &self,
        id: &str,
        event_type: &str,
        payment_intent_id: Option<&str>,
    ) -> SqlxResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (id, event_type, payment_intent_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(event_type)
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Drop a recorded event so a redelivery can apply it again
    pub async fn forget(&self, id: &str) -> SqlxResult<()> {
        sqlx::query("DELETE FROM payment_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent event of one of `event_types` received for a payment intent
    pub async fn latest_for_intent(
        &self,
        payment_intent_id: &str,
        event_types: &[&str],
    ) -> SqlxResult<Option<PaymentEvent>> {
        let event_types: Vec<String> = event_types.iter().map(|t| t.to_string()).collect();
        sqlx::query_as::<_, PaymentEvent>(
            r#"
            SELECT id, event_type, payment_intent_id, received_at
            FROM payment_events
            WHERE payment_intent_id = $1 AND event_type = ANY($2)
            ORDER BY received_at DESC
            LIMIT 1
            "#,
        )
        .bind(payment_intent_id)
        .bind(&event_types)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find(&self, id: &str) -> SqlxResult<Option<PaymentEvent>> {
        sqlx::query_as::<_, PaymentEvent>(
            "SELECT id, event_type, payment_intent_id, received_at FROM payment_events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
