use crate::models::{AvailabilitySlot, NewSlot};
use chrono::NaiveDate;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Repository for bookable time slots
pub struct AvailabilityRepository {
    pool: PgPool,
}

impl AvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Slots of an activity ordered by date then start time
    pub async fn list(
        &self,
        activity_id: Uuid,
        from_date: Option<NaiveDate>,
    ) -> SqlxResult<Vec<AvailabilitySlot>> {
        sqlx::query_as::<_, AvailabilitySlot>(
            r#"
            SELECT id, activity_id, date, start_time, end_time, capacity, booked
            FROM availability
            WHERE activity_id = $1
              AND ($2::date IS NULL OR date >= $2)
            ORDER BY date ASC, start_time ASC
            "#,
        )
        .bind(activity_id)
        .bind(from_date)
        .fetch_all(&self.pool)
        .await
    }

    /// Open a slot; a second slot at the same start fails with a unique violation
    pub async fn create(&self, activity_id: Uuid, slot: &NewSlot) -> SqlxResult<AvailabilitySlot> {
        sqlx::query_as::<_, AvailabilitySlot>(
            r#"
            INSERT INTO availability (activity_id, date, start_time, end_time, capacity, booked)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING id, activity_id, date, start_time, end_time, capacity, booked
            "#,
        )
        .bind(activity_id)
        .bind(slot.date)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.capacity)
        .fetch_one(&self.pool)
        .await
    }
}
