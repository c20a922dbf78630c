use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

use super::review::ReviewWithUser;

pub const UNKNOWN_CATEGORY: &str = "Unknown";
pub const UNKNOWN_CATEGORY_SLUG: &str = "unknown";
pub const UNKNOWN_HOST: &str = "Unknown Host";

/// Activity listing owned by a host
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price: Decimal, // NUMERIC(12, 2) in database
    pub duration_minutes: i32,
    pub min_age: i32,
    pub max_age: i32,
    pub capacity: i32,
    pub images: Vec<String>,
    pub featured: bool,
    pub active: bool,
    pub host_id: Uuid,
    pub category_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Activity joined with its category, host and review aggregate.
/// Serializes with display fallbacks applied.
#[derive(Debug, Clone, FromRow)]
pub struct ActivitySummary {
    #[sqlx(flatten)]
    pub activity: Activity,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub host_name: Option<String>,
    pub host_image: Option<String>,
    pub host_bio: Option<String>,
    pub avg_rating: f64,
    pub review_count: i64,
}

impl ActivitySummary {
    pub fn category_label(&self) -> &str {
        self.category_name.as_deref().unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn category_slug_label(&self) -> &str {
        self.category_slug.as_deref().unwrap_or(UNKNOWN_CATEGORY_SLUG)
    }

    pub fn host_label(&self) -> &str {
        self.host_name.as_deref().unwrap_or(UNKNOWN_HOST)
    }

    pub fn host_image_url(&self) -> &str {
        self.host_image.as_deref().unwrap_or("")
    }

    /// Average rating rounded to one decimal place
    pub fn rating(&self) -> f64 {
        round_rating(self.avg_rating)
    }
}

#[derive(Serialize)]
struct ActivitySummaryView<'a> {
    #[serde(flatten)]
    activity: &'a Activity,
    category_name: &'a str,
    category_slug: &'a str,
    host_name: &'a str,
    host_image: &'a str,
    host_bio: Option<&'a str>,
    avg_rating: f64,
    rating: f64,
    review_count: i64,
}

impl Serialize for ActivitySummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rating = self.rating();
        ActivitySummaryView {
            activity: &self.activity,
            category_name: self.category_label(),
            category_slug: self.category_slug_label(),
            host_name: self.host_label(),
            host_image: self.host_image_url(),
            host_bio: self.host_bio.as_deref(),
            avg_rating: rating,
            rating,
            review_count: self.review_count,
        }
        .serialize(serializer)
    }
}

/// Activity detail page payload
#[derive(Debug, Clone, Serialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub summary: ActivitySummary,
    pub reviews: Vec<ReviewWithUser>,
}

/// Round an average rating to one decimal place
pub fn round_rating(avg: f64) -> f64 {
    if !avg.is_finite() || avg <= 0.0 {
        return 0.0;
    }
    (avg * 10.0).round() / 10.0
}

/// Input for creating an activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub price: Decimal,
    #[serde(alias = "duration")]
    pub duration_minutes: i32,
    pub min_age: i32,
    pub max_age: i32,
    pub capacity: i32,
    pub category_id: Uuid,
    #[serde(default)]
    pub images: Vec<String>,
    pub host_id: Uuid,
}

impl NewActivity {
    /// Validate field ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description must not be empty".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("location must not be empty".to_string());
        }
        if self.price < Decimal::ZERO {
            return Err("price must be at least 0".to_string());
        }
        if self.duration_minutes < 1 {
            return Err("duration must be at least 1 minute".to_string());
        }
        if self.min_age < 0 || self.max_age < 0 {
            return Err("ages must be at least 0".to_string());
        }
        if self.min_age > self.max_age {
            return Err("min age must not exceed max age".to_string());
        }
        if self.capacity < 1 {
            return Err("capacity must be at least 1".to_string());
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err("latitude must be between -90 and 90".to_string());
            }
        }
        if let Some(lng) = self.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err("longitude must be between -180 and 180".to_string());
            }
        }
        if self.images.iter().any(|url| url.trim().is_empty()) {
            return Err("image URLs must not be empty".to_string());
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn new_activity() -> NewActivity {
        NewActivity {
            title: "Forest Trail".into(),
            description: "A gentle hike".into(),
            location: "Yosemite".into(),
            address: None,
            latitude: Some(37.86),
            longitude: Some(-119.53),
            price: Decimal::new(4500, 2),
            duration_minutes: 90,
            min_age: 4,
            max_age: 99,
            capacity: 12,
            category_id: Uuid::new_v4(),
            images: vec!["https://cdn.example.com/a.jpg".into()],
            host_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_round_rating() {
        assert_eq!(round_rating(0.0), 0.0);
        assert_eq!(round_rating(4.25), 4.3);
        assert_eq!(round_rating(3.333), 3.3);
        assert_eq!(round_rating(f64::NAN), 0.0);
    }

    #[test]
    fn test_summary_fallback_labels() {
        let mut summary = summary(activity("Kayak", 30, 8, 60), 4.66, 3);
        summary.category_name = None;
        summary.category_slug = None;
        assert_eq!(summary.category_label(), "Unknown");
        assert_eq!(summary.category_slug_label(), "unknown");
        assert_eq!(summary.host_label(), "Unknown Host");
        assert_eq!(summary.host_image_url(), "");
        assert_eq!(summary.rating(), 4.7);
    }

    #[test]
    fn test_new_activity_validation() {
        assert!(new_activity().validate().is_ok());

        let mut input = new_activity();
        input.capacity = 0;
        assert!(input.validate().is_err());

        let mut input = new_activity();
        input.title = "   ".into();
        assert!(input.validate().is_err());

        let mut input = new_activity();
        input.price = Decimal::new(-1, 0);
        assert!(input.validate().is_err());

        let mut input = new_activity();
        input.latitude = Some(123.0);
        assert!(input.validate().is_err());

        let mut input = new_activity();
        input.min_age = 12;
        input.max_age = 8;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_summary_json_applies_fallbacks() {
        let mut summary = summary(activity("Ridge Walk", 20, 6, 99), 13.0 / 3.0, 3);
        summary.category_name = None;
        summary.category_slug = None;

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["host_name"], "Unknown Host");
        assert_eq!(json["host_image"], "");
        assert_eq!(json["category_name"], "Unknown");
        assert_eq!(json["category_slug"], "unknown");
        assert_eq!(json["rating"], 4.3);
        assert_eq!(json["avg_rating"], 4.3);
        assert_eq!(json["review_count"], 3);
        assert_eq!(json["title"], "Ridge Walk");
    }

    #[test]
    fn test_detail_json_labels_anonymous_reviewers() {
        let detail = ActivityDetail {
            summary: summary(activity("Ridge Walk", 20, 6, 99), 5.0, 1),
            reviews: vec![ReviewWithUser {
                id: Uuid::new_v4(),
                rating: 5,
                comment: Some("Great day out".into()),
                reviewer_name: None,
                reviewer_image: None,
                created_at: chrono::Utc::now().naive_utc(),
            }],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["host_name"], "Unknown Host");
        assert_eq!(json["rating"], 5.0);
        assert_eq!(json["reviews"][0]["reviewer_name"], "Anonymous");
        assert_eq!(json["reviews"][0]["reviewer_image"], "");
    }

    #[test]
    fn test_new_activity_accepts_duration_alias() {
        let json = serde_json::json!({
            "title": "Canoe",
            "description": "Paddle",
            "location": "River",
            "price": "25.00",
            "duration": 60,
            "minAge": 6,
            "maxAge": 70,
            "capacity": 8,
            "categoryId": Uuid::new_v4(),
            "hostId": Uuid::new_v4()
        });
        let input: NewActivity = serde_json::from_value(json).unwrap();
        assert_eq!(input.duration_minutes, 60);
        assert!(input.images.is_empty());
    }
}
