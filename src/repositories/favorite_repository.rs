use super::activity_repository::SUMMARY_SELECT;
use crate::error::RepositoryError;
use crate::models::{Favorite, FavoriteActivity, FavoriteToggle};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Repository for user favorites
pub struct FavoriteRepository {
    pool: PgPool,
}

impl FavoriteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A user's favorited activities that are still active, newest favorite first
    pub async fn list_by_user(&self, user_id: Uuid) -> SqlxResult<Vec<FavoriteActivity>> {
        // SUMMARY_SELECT starts with SELECT; splice the favorite id into its column list
        let select = SUMMARY_SELECT.replacen("SELECT", "SELECT f.id AS favorite_id,", 1);
        sqlx::query_as::<_, FavoriteActivity>(&format!(
            r#"{}
            JOIN favorites f ON f.activity_id = a.id
            WHERE f.user_id = $1 AND a.active = TRUE
            ORDER BY f.created_at DESC
            "#,
            select
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find(&self, user_id: Uuid, activity_id: Uuid) -> SqlxResult<Option<Favorite>> {
        sqlx::query_as::<_, Favorite>(
            r#"
            SELECT id, user_id, activity_id, created_at
            FROM favorites
            WHERE user_id = $1 AND activity_id = $2
            "#,
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert if absent; returns the existing row otherwise
    pub async fn add(&self, user_id: Uuid, activity_id: Uuid) -> Result<Favorite, RepositoryError> {
        let inserted = sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (user_id, activity_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, activity_id) DO NOTHING
            RETURNING id, user_id, activity_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(favorite) => Ok(favorite),
            None => self
                .find(user_id, activity_id)
                .await?
                .ok_or_else(|| RepositoryError::NotFound("Favorite not found".to_string())),
        }
    }

    /// True when a row was deleted
    pub async fn remove(&self, user_id: Uuid, activity_id: Uuid) -> SqlxResult<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND activity_id = $2")
            .bind(user_id)
            .bind(activity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove when present, insert otherwise
    pub async fn toggle(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
    ) -> Result<FavoriteToggle, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND activity_id = $2")
            .bind(user_id)
            .bind(activity_id)
            .execute(&mut *tx)
            .await?;

        let toggle = if deleted.rows_affected() > 0 {
            FavoriteToggle::removed()
        } else {
            sqlx::query(
                r#"
                INSERT INTO favorites (user_id, activity_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, activity_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(activity_id)
            .execute(&mut *tx)
            .await?;
            FavoriteToggle::added()
        };

        tx.commit().await?;

        Ok(toggle)
    }
}
