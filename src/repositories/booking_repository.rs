//! Repository for bookings and the seat counters they hold

use crate::error::RepositoryError;
use crate::models::{
    AvailabilitySlot, Booking, BookingDetail, BookingStatus, BookingTransition, BookingWithActivity,
    BookingWithUser, NewBooking,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, activity_id, user_id, date, start_time, end_time, \
     participants, total_price, status, payment_intent_id, created_at, updated_at";

const BOOKING_COLUMNS_B: &str = "b.id, b.activity_id, b.user_id, b.date, b.start_time, \
     b.end_time, b.participants, b.total_price, b.status, b.payment_intent_id, \
     b.created_at, b.updated_at";

pub struct BookingRepository {
    pool: PgPool,
}

/// Give a booking's seats back to its slot, if it was booked against one
async fn release_seats(conn: &mut PgConnection, booking: &Booking) -> SqlxResult<()> {
    sqlx::query(
        r#"
        UPDATE availability
        SET booked = GREATEST(booked - $4, 0)
        WHERE activity_id = $1 AND date = $2 AND start_time = $3
        "#,
    )
    .bind(booking.activity_id)
    .bind(booking.date)
    .bind(booking.start_time)
    .bind(booking.participants)
    .execute(conn)
    .await?;
    Ok(())
}

async fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: BookingStatus,
) -> SqlxResult<Booking> {
    sqlx::query_as::<_, Booking>(&format!(
        r#"
        UPDATE bookings
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        BOOKING_COLUMNS
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_one(conn)
    .await
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Booking with activity, host and booker; None when the activity is gone
    pub async fn find_detail(&self, id: Uuid) -> SqlxResult<Option<BookingDetail>> {
        sqlx::query_as::<_, BookingDetail>(&format!(
            r#"
            SELECT {},
                   a.title AS activity_title, a.location AS activity_location,
                   a.description AS activity_description, a.images AS activity_images,
                   a.price AS activity_price, a.host_id,
                   h.name AS host_name, h.image AS host_image,
                   u.name AS user_name, u.email AS user_email
            FROM bookings b
            JOIN activities a ON a.id = b.activity_id
            LEFT JOIN users h ON h.id = a.host_id
            LEFT JOIN users u ON u.id = b.user_id
            WHERE b.id = $1
            "#,
            BOOKING_COLUMNS_B
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// A user's bookings, newest first
    pub async fn list_by_user(&self, user_id: Uuid) -> SqlxResult<Vec<BookingWithActivity>> {
        sqlx::query_as::<_, BookingWithActivity>(&format!(
            r#"
            SELECT {},
                   a.title AS activity_title, a.location AS activity_location,
                   a.images AS activity_images,
                   h.name AS host_name, h.image AS host_image
            FROM bookings b
            JOIN activities a ON a.id = b.activity_id
            LEFT JOIN users h ON h.id = a.host_id
            WHERE b.user_id = $1
            ORDER BY b.created_at DESC
            "#,
            BOOKING_COLUMNS_B
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// An activity's bookings with the booker's profile, newest first
    pub async fn list_by_activity(&self, activity_id: Uuid) -> SqlxResult<Vec<BookingWithUser>> {
        sqlx::query_as::<_, BookingWithUser>(&format!(
            r#"
            SELECT {},
                   u.name AS user_name, u.email AS user_email, u.image AS user_image
            FROM bookings b
            LEFT JOIN users u ON u.id = b.user_id
            WHERE b.activity_id = $1
            ORDER BY b.created_at DESC
            "#,
            BOOKING_COLUMNS_B
        ))
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Insert a PENDING booking. When a slot exists for the requested start,
    /// its seats are reserved in the same transaction.
    pub async fn create_with_reservation(
        &self,
        user_id: Uuid,
        input: &NewBooking,
        total_price: Decimal,
    ) -> Result<Booking, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let slot = sqlx::query_as::<_, AvailabilitySlot>(
            r#"
            SELECT id, activity_id, date, start_time, end_time, capacity, booked
            FROM availability
            WHERE activity_id = $1 AND date = $2 AND start_time = $3
            FOR UPDATE
            "#,
        )
        .bind(input.activity_id)
        .bind(input.date)
        .bind(input.start())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(slot) = slot {
            if !slot.can_fit(input.participants) {
                return Err(RepositoryError::BusinessRule(
                    "Not enough availability".to_string(),
                ));
            }

            sqlx::query("UPDATE availability SET booked = booked + $2 WHERE id = $1")
                .bind(slot.id)
                .bind(input.participants)
                .execute(&mut *tx)
                .await?;
        }

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings
            (activity_id, user_id, date, start_time, end_time, participants, total_price,
             status, payment_intent_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(input.activity_id)
        .bind(user_id)
        .bind(input.date)
        .bind(input.start())
        .bind(input.end())
        .bind(input.participants)
        .bind(total_price)
        .bind(input.payment_intent_id.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(booking)
    }

    /// Move a booking to a new status, enforcing the transition table.
    /// Cancelling gives the seats back to the slot.
    pub async fn update_status(
        &self,
        id: Uuid,
        next: BookingStatus,
    ) -> Result<BookingTransition, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Booking not found".to_string()))?;

        let previous = current.status_enum();
        if previous == next {
            return Ok(BookingTransition {
                booking: current,
                previous,
            });
        }
        if !previous.can_transition_to(next) {
            return Err(RepositoryError::BusinessRule(format!(
                "Cannot change booking status from {} to {}",
                previous.as_str(),
                next.as_str()
            )));
        }

        let booking = set_status(&mut tx, id, next).await?;
        if next == BookingStatus::Cancelled {
            release_seats(&mut tx, &current).await?;
        }

        tx.commit().await?;

        Ok(BookingTransition { booking, previous })
    }

    /// Move every PENDING booking paid with the intent to `next`.
    /// Bookings in any other status are left alone.
    pub async fn resolve_pending_by_payment_intent(
        &self,
        payment_intent_id: &str,
        next: BookingStatus,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE payment_intent_id = $1 AND status = 'PENDING'
            FOR UPDATE
            "#,
            BOOKING_COLUMNS
        ))
        .bind(payment_intent_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut updated = Vec::with_capacity(pending.len());
        for booking in &pending {
            updated.push(set_status(&mut tx, booking.id, next).await?);
            if next == BookingStatus::Cancelled {
                release_seats(&mut tx, booking).await?;
            }
        }

        tx.commit().await?;

        Ok(updated)
    }
}
