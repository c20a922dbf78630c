use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Review left by a user on an activity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16, // SMALLINT 1-5
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

pub const ANONYMOUS_REVIEWER: &str = "Anonymous";

/// Review with the reviewer's public profile
#[derive(Debug, Clone, FromRow)]
pub struct ReviewWithUser {
    pub id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub reviewer_name: Option<String>,
    pub reviewer_image: Option<String>,
    pub created_at: NaiveDateTime,
}

impl ReviewWithUser {
    pub fn reviewer_label(&self) -> &str {
        self.reviewer_name.as_deref().unwrap_or(ANONYMOUS_REVIEWER)
    }

    pub fn reviewer_image_url(&self) -> &str {
        self.reviewer_image.as_deref().unwrap_or("")
    }
}

#[derive(Serialize)]
struct ReviewView<'a> {
    id: Uuid,
    rating: i16,
    comment: Option<&'a str>,
    reviewer_name: &'a str,
    reviewer_image: &'a str,
    created_at: NaiveDateTime,
}

impl Serialize for ReviewWithUser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReviewView {
            id: self.id,
            rating: self.rating,
            comment: self.comment.as_deref(),
            reviewer_name: self.reviewer_label(),
            reviewer_image: self.reviewer_image_url(),
            created_at: self.created_at,
        }
        .serialize(serializer)
    }
}

/// Check a rating is within 1..=5 and the comment is sane
pub fn validate_review(rating: i32, comment: Option<&str>) -> Result<i16, String> {
    if rating < i32::from(MIN_RATING) || rating > i32::from(MAX_RATING) {
        return Err(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        ));
    }
    if let Some(comment) = comment {
        if comment.chars().count() > 5000 {
            return Err("comment must be at most 5000 characters".to_string());
        }
    }
    Ok(rating as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_review() {
        assert_eq!(validate_review(5, Some("Loved it")), Ok(5));
        assert_eq!(validate_review(1, None), Ok(1));
        assert!(validate_review(0, None).is_err());
        assert!(validate_review(6, None).is_err());
    }
}
