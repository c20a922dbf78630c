use crate::error::{AppError, AppResult};
use crate::models::{Favorite, FavoriteActivity, FavoriteToggle, User};
use crate::repositories::{ActivityRepository, FavoriteRepository};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Service for the caller's wishlist
pub struct FavoriteService {
    favorite_repo: Arc<FavoriteRepository>,
    activity_repo: Arc<ActivityRepository>,
}

impl FavoriteService {
    pub fn new(
        favorite_repo: Arc<FavoriteRepository>,
        activity_repo: Arc<ActivityRepository>,
    ) -> Self {
        Self {
            favorite_repo,
            activity_repo,
        }
    }

    async fn ensure_activity(&self, activity_id: Uuid) -> AppResult<()> {
        match self.activity_repo.find_by_id(activity_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Activity not found".to_string())),
        }
    }

    pub async fn list(&self, caller: &User) -> AppResult<Vec<FavoriteActivity>> {
        Ok(self.favorite_repo.list_by_user(caller.id).await?)
    }

    pub async fn is_favorited(&self, caller: &User, activity_id: Uuid) -> AppResult<bool> {
        Ok(self
            .favorite_repo
            .find(caller.id, activity_id)
            .await?
            .is_some())
    }

    /// Idempotent add
    pub async fn add(&self, caller: &User, activity_id: Uuid) -> AppResult<Favorite> {
        self.ensure_activity(activity_id).await?;
        Ok(self.favorite_repo.add(caller.id, activity_id).await?)
    }

    /// False when there was nothing to remove
    pub async fn remove(&self, caller: &User, activity_id: Uuid) -> AppResult<bool> {
        Ok(self.favorite_repo.remove(caller.id, activity_id).await?)
    }

    pub async fn toggle(&self, caller: &User, activity_id: Uuid) -> AppResult<FavoriteToggle> {
        self.ensure_activity(activity_id).await?;
        let toggle = self.favorite_repo.toggle(caller.id, activity_id).await?;
        debug!(
            "Favorite {:?} for user {} on activity {}",
            toggle.action, caller.id, activity_id
        );
        Ok(toggle)
    }
}
