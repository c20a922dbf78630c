use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::review::validate_review;
use crate::models::{Review, User};
use crate::repositories::{ActivityRepository, ReviewRepository};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct ReviewService {
    review_repo: Arc<ReviewRepository>,
    activity_repo: Arc<ActivityRepository>,
}

impl ReviewService {
    pub fn new(review_repo: Arc<ReviewRepository>, activity_repo: Arc<ActivityRepository>) -> Self {
        Self {
            review_repo,
            activity_repo,
        }
    }

    /// One review per user and activity
    pub async fn create(
        &self,
        caller: &User,
        activity_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> AppResult<Review> {
        let comment = comment.filter(|c| !c.trim().is_empty());
        let rating = validate_review(rating, comment.as_deref()).map_err(AppError::Validation)?;

        if self.activity_repo.find_by_id(activity_id).await?.is_none() {
            return Err(AppError::NotFound("Activity not found".to_string()));
        }

        let review = self
            .review_repo
            .create(caller.id, activity_id, rating, comment.as_deref())
            .await
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::Duplicate(_) => {
                    AppError::Duplicate("You have already reviewed this activity".to_string())
                }
                other => other.into(),
            })?;

        info!("Review {} ({}★) on activity {}", review.id, review.rating, activity_id);
        Ok(review)
    }
}
