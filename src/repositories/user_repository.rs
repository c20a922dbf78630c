use crate::models::{ProfileUpdate, User, UserRole};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, external_id, email, name, image, bio, phone, role, created_at, updated_at";

/// Repository for user data access
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a user by identity-provider subject
    pub async fn find_by_external_id(&self, external_id: &str) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE external_id = $1",
            USER_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a user for the identity or patch the existing one (upsert pattern)
    /// New users start as GUEST; an existing role is never touched here
    pub async fn upsert_from_identity(
        &self,
        external_id: &str,
        email: &str,
        name: Option<&str>,
        image: Option<&str>,
    ) -> SqlxResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (external_id, email, name, image, role)
            VALUES ($1, $2, $3, $4, 'GUEST')
            ON CONFLICT (external_id) DO UPDATE
            SET email = EXCLUDED.email,
                name = COALESCE(EXCLUDED.name, users.name),
                image = COALESCE(EXCLUDED.image, users.image),
                updated_at = NOW()
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(external_id)
        .bind(email)
        .bind(name)
        .bind(image)
        .fetch_one(&self.pool)
        .await
    }

    /// Patch bio/phone; fields left as None keep their value
    pub async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET bio = COALESCE($2, bio),
                phone = COALESCE($3, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(update.bio.as_deref())
        .bind(update.phone.as_deref())
        .fetch_optional(&self.pool)
        .await
    }

    /// Set a user's role
    pub async fn update_role(&self, id: Uuid, role: UserRole) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}
