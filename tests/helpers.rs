#![allow(dead_code)]

use chrono::NaiveDate;
use movinature_backend::auth::Identity;
use movinature_backend::config::{AppConfig, AuthConfig, PaymentConfig};
use movinature_backend::models::*;
use movinature_backend::payment_client::sign_webhook_payload;
use movinature_backend::repositories::*;
use movinature_backend::AppState;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const IDENTITY_SECRET: &str = "test-identity-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Repositories over a test pool
pub struct TestDatabase {
    pub pool: PgPool,
    pub user_repo: Arc<UserRepository>,
    pub category_repo: Arc<CategoryRepository>,
    pub activity_repo: Arc<ActivityRepository>,
    pub availability_repo: Arc<AvailabilityRepository>,
    pub booking_repo: Arc<BookingRepository>,
    pub favorite_repo: Arc<FavoriteRepository>,
    pub review_repo: Arc<ReviewRepository>,
    pub payment_event_repo: Arc<PaymentEventRepository>,
}

impl TestDatabase {
    /// Create TestDatabase from an existing pool (useful with sqlx::test)
    pub async fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: pool.clone(),
            user_repo: Arc::new(UserRepository::new(pool.clone())),
            category_repo: Arc::new(CategoryRepository::new(pool.clone())),
            activity_repo: Arc::new(ActivityRepository::new(pool.clone())),
            availability_repo: Arc::new(AvailabilityRepository::new(pool.clone())),
            booking_repo: Arc::new(BookingRepository::new(pool.clone())),
            favorite_repo: Arc::new(FavoriteRepository::new(pool.clone())),
            review_repo: Arc::new(ReviewRepository::new(pool.clone())),
            payment_event_repo: Arc::new(PaymentEventRepository::new(pool)),
        }
    }

    /// Clean up all test data; seeded categories stay
    pub async fn cleanup(&self) {
        sqlx::query(
            "TRUNCATE TABLE payment_events, reviews, favorites, bookings, availability, activities, users CASCADE",
        )
        .execute(&self.pool)
        .await
        .expect("Failed to cleanup test data");
    }
}

/// Configuration with known secrets and no outbound credentials
pub fn test_config(audit_dir: &TempDir) -> AppConfig {
    AppConfig {
        auth: AuthConfig {
            identity_secret: Some(IDENTITY_SECRET.to_string()),
            max_clock_skew_secs: 300,
            allow_unsigned: false,
        },
        payment: PaymentConfig {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            service_fee: Decimal::new(500, 2),
            ..PaymentConfig::default()
        },
        audit_log_dir: audit_dir.path().to_string_lossy().to_string(),
        ..AppConfig::default()
    }
}

/// Full application state over a test pool
pub struct TestApp {
    pub db: TestDatabase,
    pub state: Arc<AppState>,
    pub audit_dir: TempDir,
}

impl TestApp {
    pub async fn new(pool: PgPool) -> Self {
        let audit_dir = TempDir::new().expect("Failed to create audit dir");
        let config = test_config(&audit_dir);
        let state = AppState::new(pool.clone(), &config).expect("Failed to build app state");
        Self {
            db: TestDatabase::from_pool(pool).await,
            state: Arc::new(state),
            audit_dir,
        }
    }

    /// Store (or fetch) the user behind a signed identity
    pub async fn user(&self, subject: &str) -> User {
        self.state
            .user_service
            .store(&identity(subject))
            .await
            .expect("Failed to store user")
    }

    pub async fn admin(&self, subject: &str) -> User {
        let user = self.user(subject).await;
        self.db
            .user_repo
            .update_role(user.id, UserRole::Admin)
            .await
            .expect("Failed to promote user")
            .expect("User vanished")
    }

    /// Create an activity hosted by `host` in the seeded hiking category
    pub async fn activity(&self, host: &User, capacity: i32, price: Decimal) -> Activity {
        let category = hiking(&self.db).await;
        self.state
            .activity_service
            .create(host, new_activity(host.id, category.id, capacity, price))
            .await
            .expect("Failed to create activity")
    }

    pub async fn booking(&self, user: &User, activity: &Activity, participants: i32) -> Booking {
        self.state
            .booking_service
            .create(user, new_booking(activity.id, participants))
            .await
            .expect("Failed to create booking")
    }
}

/// Identity signed with the test secret at the current time
pub fn identity(subject: &str) -> Identity {
    identity_with_email(subject, &format!("{}@example.com", subject))
}

pub fn identity_with_email(subject: &str, email: &str) -> Identity {
    Identity {
        subject: subject.to_string(),
        email: Some(email.to_string()),
        name: Some(format!("User {}", subject)),
        picture_url: None,
        timestamp: chrono::Utc::now().timestamp(),
        signature: String::new(),
    }
    .signed(IDENTITY_SECRET)
    .expect("Failed to sign identity")
}

pub async fn hiking(db: &TestDatabase) -> Category {
    db.category_repo
        .find_by_slug("hiking")
        .await
        .expect("Failed to load category")
        .expect("Seeded hiking category missing")
}

pub fn new_activity(host_id: Uuid, category_id: Uuid, capacity: i32, price: Decimal) -> NewActivity {
    NewActivity {
        title: "Sunrise Ridge Hike".to_string(),
        description: "A guided family hike up to the ridge".to_string(),
        location: "Boulder, CO".to_string(),
        address: None,
        latitude: None,
        longitude: None,
        price,
        duration_minutes: 180,
        min_age: 6,
        max_age: 99,
        capacity,
        category_id,
        images: vec!["https://img.example.com/ridge.jpg".to_string()],
        host_id,
    }
}

/// A date safely in the future
pub fn future_date(days: i64) -> NaiveDate {
    chrono::Utc::now().date_naive() + chrono::Duration::days(days)
}

pub fn new_booking(activity_id: Uuid, participants: i32) -> NewBooking {
    NewBooking {
        activity_id,
        date: future_date(14),
        start_time: None,
        end_time: None,
        participants,
        total_price: None,
        payment_intent_id: None,
    }
}

/// Gateway webhook payload and matching signature header
pub fn signed_webhook(event_id: &str, event_type: &str, intent_id: &str) -> (Vec<u8>, String) {
    let payload = serde_json::json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": { "id": intent_id, "object": "payment_intent" } }
    })
    .to_string()
    .into_bytes();
    let header = sign_webhook_payload(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
    (payload, header)
}
