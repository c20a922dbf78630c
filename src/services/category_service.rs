use crate::error::AppResult;
use crate::models::{Category, CategoryWithCount};
use crate::repositories::CategoryRepository;
use std::sync::Arc;
use uuid::Uuid;

pub struct CategoryService {
    category_repo: Arc<CategoryRepository>,
}

impl CategoryService {
    pub fn new(category_repo: Arc<CategoryRepository>) -> Self {
        Self { category_repo }
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        Ok(self.category_repo.list().await?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(self.category_repo.find_by_id(id).await?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Category>> {
        Ok(self.category_repo.find_by_slug(slug.trim()).await?)
    }

    /// Categories with their active activity counts
    pub async fn list_with_counts(&self) -> AppResult<Vec<CategoryWithCount>> {
        Ok(self.category_repo.list_with_counts().await?)
    }
}
