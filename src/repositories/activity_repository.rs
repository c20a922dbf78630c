//! Repository for activity listings

use crate::error::RepositoryError;
use crate::models::{Activity, ActivitySummary, NewActivity};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const ACTIVITY_COLUMNS: &str = "id, title, description, location, address, latitude, longitude, \
     price, duration_minutes, min_age, max_age, capacity, images, featured, active, \
     host_id, category_id, created_at, updated_at";

/// Activity row joined with category, host and review aggregate.
/// Callers append WHERE / ORDER BY / LIMIT clauses.
pub(crate) const SUMMARY_SELECT: &str = r#"
    SELECT a.id, a.title, a.description, a.location, a.address, a.latitude, a.longitude,
           a.price, a.duration_minutes, a.min_age, a.max_age, a.capacity, a.images,
           a.featured, a.active, a.host_id, a.category_id, a.created_at, a.updated_at,
           c.name AS category_name, c.slug AS category_slug,
           u.name AS host_name, u.image AS host_image, u.bio AS host_bio,
           COALESCE(r.avg_rating, 0)::float8 AS avg_rating,
           COALESCE(r.review_count, 0)::int8 AS review_count
    FROM activities a
    LEFT JOIN categories c ON c.id = a.category_id
    LEFT JOIN users u ON u.id = a.host_id
    LEFT JOIN (
        SELECT activity_id, AVG(rating)::float8 AS avg_rating, COUNT(*) AS review_count
        FROM reviews
        GROUP BY activity_id
    ) r ON r.activity_id = a.id
"#;

/// Escape LIKE metacharacters and wrap in wildcards
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Raw activity row
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Activity>> {
        sqlx::query_as::<_, Activity>(&format!(
            "SELECT {} FROM activities WHERE id = $1",
            ACTIVITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Enriched activity regardless of its active flag
    pub async fn find_summary(&self, id: Uuid) -> SqlxResult<Option<ActivitySummary>> {
        sqlx::query_as::<_, ActivitySummary>(&format!("{} WHERE a.id = $1", SUMMARY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Active activities, optionally narrowed to a category and/or the featured flag
    pub async fn list(
        &self,
        category_id: Option<Uuid>,
        featured: Option<bool>,
        limit: Option<i64>,
    ) -> SqlxResult<Vec<ActivitySummary>> {
        sqlx::query_as::<_, ActivitySummary>(&format!(
            r#"{}
            WHERE a.active = TRUE
              AND ($1::uuid IS NULL OR a.category_id = $1)
              AND ($2::bool IS NULL OR a.featured = $2)
            ORDER BY a.created_at DESC
            LIMIT $3
            "#,
            SUMMARY_SELECT
        ))
        .bind(category_id)
        .bind(featured)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Featured and active
    pub async fn featured(&self, limit: Option<i64>) -> SqlxResult<Vec<ActivitySummary>> {
        self.list(None, Some(true), limit).await
    }

    /// Every activity of a host, including inactive ones
    pub async fn by_host(&self, host_id: Uuid) -> SqlxResult<Vec<ActivitySummary>> {
        sqlx::query_as::<_, ActivitySummary>(&format!(
            "{} WHERE a.host_id = $1 ORDER BY a.created_at DESC",
            SUMMARY_SELECT
        ))
        .bind(host_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Case-insensitive substring match over title, description and location
    pub async fn search(&self, query: &str, limit: Option<i64>) -> SqlxResult<Vec<ActivitySummary>> {
        sqlx::query_as::<_, ActivitySummary>(&format!(
            r#"{}
            WHERE a.active = TRUE
              AND (a.title ILIKE $1 OR a.description ILIKE $1 OR a.location ILIKE $1)
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
            SUMMARY_SELECT
        ))
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Insert an activity and promote a GUEST host to HOST in one transaction
    pub async fn create(&self, input: &NewActivity) -> Result<Activity, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let activity = sqlx::query_as::<_, Activity>(&format!(
            r#"
            INSERT INTO activities
            (title, description, location, address, latitude, longitude, price,
             duration_minutes, min_age, max_age, capacity, images, featured, active,
             host_id, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, FALSE, TRUE, $13, $14)
            RETURNING {}
            "#,
            ACTIVITY_COLUMNS
        ))
        .bind(input.title.trim())
        .bind(input.description.trim())
        .bind(input.location.trim())
        .bind(input.address.as_deref())
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.price)
        .bind(input.duration_minutes)
        .bind(input.min_age)
        .bind(input.max_age)
        .bind(input.capacity)
        .bind(&input.images)
        .bind(input.host_id)
        .bind(input.category_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET role = 'HOST', updated_at = NOW() WHERE id = $1 AND role = 'GUEST'",
        )
        .bind(input.host_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(activity)
    }

    /// Show or hide a listing
    pub async fn set_active(&self, id: Uuid, active: bool) -> SqlxResult<Option<Activity>> {
        sqlx::query_as::<_, Activity>(&format!(
            r#"
            UPDATE activities
            SET active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ACTIVITY_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("kayak"), "%kayak%");
        assert_eq!(like_pattern(" 100% fun "), "%100\\% fun%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
