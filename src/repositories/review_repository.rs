use crate::models::{Review, ReviewWithUser};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of an activity with reviewer profile, newest first
    pub async fn list_for_activity(&self, activity_id: Uuid) -> SqlxResult<Vec<ReviewWithUser>> {
        sqlx::query_as::<_, ReviewWithUser>(
            r#"
            SELECT r.id, r.rating, r.comment,
                   u.name AS reviewer_name, u.image AS reviewer_image,
                   r.created_at
            FROM reviews r
            LEFT JOIN users u ON u.id = r.user_id
            WHERE r.activity_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Insert a review; a second review by the same user is a unique violation
    pub async fn create(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
        rating: i16,
        comment: Option<&str>,
    ) -> SqlxResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (activity_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, activity_id, user_id, rating, comment, created_at
            "#,
        )
        .bind(activity_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.pool)
        .await
    }
}
