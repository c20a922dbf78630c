use super::ensure_host_or_admin;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{
    Activity, ActivityDetail, ActivityFilter, ActivityPage, ActivitySummary, AvailabilitySlot,
    NewActivity, NewSlot, User,
};
use crate::repositories::{
    ActivityRepository, AvailabilityRepository, CategoryRepository, ReviewRepository,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Upper bound on `limit` arguments
pub const MAX_LIMIT: i64 = 100;

/// Reject non-positive limits and cap large ones
pub fn normalize_limit(limit: Option<i64>) -> AppResult<Option<i64>> {
    match limit {
        None => Ok(None),
        Some(l) if l < 1 => Err(AppError::Validation(
            "limit must be at least 1".to_string(),
        )),
        Some(l) => Ok(Some(l.min(MAX_LIMIT))),
    }
}

/// Service for activity listings and their availability
pub struct ActivityService {
    activity_repo: Arc<ActivityRepository>,
    category_repo: Arc<CategoryRepository>,
    review_repo: Arc<ReviewRepository>,
    availability_repo: Arc<AvailabilityRepository>,
}

impl ActivityService {
    pub fn new(
        activity_repo: Arc<ActivityRepository>,
        category_repo: Arc<CategoryRepository>,
        review_repo: Arc<ReviewRepository>,
        availability_repo: Arc<AvailabilityRepository>,
    ) -> Self {
        Self {
            activity_repo,
            category_repo,
            review_repo,
            availability_repo,
        }
    }

    async fn require_activity(&self, id: Uuid) -> AppResult<Activity> {
        self.activity_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
    }

    /// Active activities
    pub async fn list(
        &self,
        category_id: Option<Uuid>,
        featured: Option<bool>,
        limit: Option<i64>,
    ) -> AppResult<Vec<ActivitySummary>> {
        let limit = normalize_limit(limit)?;
        Ok(self.activity_repo.list(category_id, featured, limit).await?)
    }

    /// Detail page payload with reviews
    pub async fn get_detail(&self, id: Uuid) -> AppResult<Option<ActivityDetail>> {
        let Some(summary) = self.activity_repo.find_summary(id).await? else {
            return Ok(None);
        };
        let reviews = self.review_repo.list_for_activity(id).await?;
        Ok(Some(ActivityDetail { summary, reviews }))
    }

    pub async fn featured(&self, limit: Option<i64>) -> AppResult<Vec<ActivitySummary>> {
        let limit = normalize_limit(limit)?;
        Ok(self.activity_repo.featured(limit).await?)
    }

    pub async fn by_host(&self, host_id: Uuid) -> AppResult<Vec<ActivitySummary>> {
        Ok(self.activity_repo.by_host(host_id).await?)
    }

    pub async fn search(&self, query: &str, limit: Option<i64>) -> AppResult<Vec<ActivitySummary>> {
        let limit = normalize_limit(limit)?;
        if query.trim().is_empty() {
            return Ok(self.activity_repo.list(None, None, limit).await?);
        }
        Ok(self.activity_repo.search(query, limit).await?)
    }

    /// Browse page: filter, sort and paginate the active listing
    pub async fn browse(&self, filter: &ActivityFilter) -> AppResult<ActivityPage> {
        filter.validate().map_err(AppError::Validation)?;
        let listing = self.activity_repo.list(None, None, None).await?;
        Ok(filter.apply(listing))
    }

    /// Create a listing hosted by the caller
    pub async fn create(&self, caller: &User, input: NewActivity) -> AppResult<Activity> {
        input.validate().map_err(AppError::Validation)?;

        if input.host_id != caller.id {
            return Err(AppError::Forbidden(
                "Activities can only be created for yourself".to_string(),
            ));
        }

        if self.category_repo.find_by_id(input.category_id).await?.is_none() {
            return Err(AppError::Validation("Category not found".to_string()));
        }

        let activity = self.activity_repo.create(&input).await?;

        info!(
            "Created activity {} '{}' for host {}",
            activity.id, activity.title, caller.id
        );
        Ok(activity)
    }

    /// Show or hide a listing
    pub async fn set_active(&self, caller: &User, id: Uuid, active: bool) -> AppResult<Activity> {
        let activity = self.require_activity(id).await?;
        ensure_host_or_admin(caller, activity.host_id)?;

        self.activity_repo
            .set_active(id, active)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
    }

    pub async fn list_availability(
        &self,
        activity_id: Uuid,
        from_date: Option<NaiveDate>,
    ) -> AppResult<Vec<AvailabilitySlot>> {
        self.require_activity(activity_id).await?;
        Ok(self.availability_repo.list(activity_id, from_date).await?)
    }

    /// Open a slot on one of the caller's activities
    pub async fn create_slot(
        &self,
        caller: &User,
        activity_id: Uuid,
        slot: NewSlot,
    ) -> AppResult<AvailabilitySlot> {
        let activity = self.require_activity(activity_id).await?;
        ensure_host_or_admin(caller, activity.host_id)?;

        slot.validate(chrono::Utc::now().date_naive())
            .map_err(AppError::Validation)?;

        match self.availability_repo.create(activity_id, &slot).await {
            Ok(created) => Ok(created),
            Err(e) => match RepositoryError::from(e) {
                RepositoryError::Duplicate(_) => Err(AppError::Duplicate(
                    "A slot already starts at that time".to_string(),
                )),
                other => Err(other.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_limit() {
        assert_eq!(normalize_limit(None).unwrap(), None);
        assert_eq!(normalize_limit(Some(5)).unwrap(), Some(5));
        assert_eq!(normalize_limit(Some(5000)).unwrap(), Some(MAX_LIMIT));
        assert!(normalize_limit(Some(0)).is_err());
    }
}
