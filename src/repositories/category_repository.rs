use crate::models::{Category, CategoryWithCount};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Repository for activity categories
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All categories, alphabetically
    pub async fn list(&self) -> SqlxResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, icon FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT id, name, slug, icon FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_slug(&self, slug: &str) -> SqlxResult<Option<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, icon FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
    }

    /// Every category with the number of its active activities
    pub async fn list_with_counts(&self) -> SqlxResult<Vec<CategoryWithCount>> {
        sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.id, c.name, c.slug, c.icon,
                   COUNT(a.id) AS activity_count
            FROM categories c
            LEFT JOIN activities a ON a.category_id = c.id AND a.active = TRUE
            GROUP BY c.id, c.name, c.slug, c.icon
            ORDER BY c.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
