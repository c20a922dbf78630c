#![cfg(feature = "postgres-tests")]

mod helpers;

use helpers::*;
use movinature_backend::error::RepositoryError;
use movinature_backend::models::*;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

// ============================================================================
// Migration Tests
// ============================================================================

#[sqlx::test]
async fn test_migrations_ran(pool: PgPool) {
    let tables = vec![
        "users",
        "categories",
        "activities",
        "availability",
        "bookings",
        "favorites",
        "reviews",
        "payment_events",
    ];

    for table in tables {
        let exists: bool = sqlx::query(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("Query failed")
        .get(0);

        assert!(exists, "Table {} should exist", table);
    }
}

#[sqlx::test]
async fn test_categories_seeded(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;

    let categories = db.category_repo.list().await.unwrap();
    assert_eq!(categories.len(), 10);

    let camping = db.category_repo.find_by_slug("camping").await.unwrap();
    assert_eq!(camping.map(|c| c.name), Some("Camping".to_string()));
    assert!(db.category_repo.find_by_slug("skydiving").await.unwrap().is_none());
}

// ============================================================================
// User Repository Tests
// ============================================================================

#[sqlx::test]
async fn test_user_upsert_patches_existing(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;

    let first = db
        .user_repo
        .upsert_from_identity("idp|alice", "alice@example.com", Some("Alice"), None)
        .await
        .unwrap();
    assert_eq!(first.role, "GUEST");

    let second = db
        .user_repo
        .upsert_from_identity(
            "idp|alice",
            "alice@new.example.com",
            Some("Alice B."),
            Some("https://img.example.com/a.png"),
        )
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.email, "alice@new.example.com");
    assert_eq!(second.name.as_deref(), Some("Alice B."));
    assert_eq!(second.image.as_deref(), Some("https://img.example.com/a.png"));
}

#[sqlx::test]
async fn test_update_profile_missing_user(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let update = ProfileUpdate {
        bio: Some("Trail lover".to_string()),
        phone: None,
    };

    let result = db
        .user_repo
        .update_profile(uuid::Uuid::new_v4(), &update)
        .await
        .unwrap();
    assert!(result.is_none());
}

// ============================================================================
// Activity Repository Tests
// ============================================================================

#[sqlx::test]
async fn test_activity_create_promotes_guest(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let host = db
        .user_repo
        .upsert_from_identity("idp|host", "host@example.com", Some("Hannah"), None)
        .await
        .unwrap();
    let category = hiking(&db).await;

    let activity = db
        .activity_repo
        .create(&new_activity(host.id, category.id, 8, Decimal::new(4500, 2)))
        .await
        .unwrap();
    assert!(activity.active);
    assert!(!activity.featured);

    let host = db.user_repo.find_by_id(host.id).await.unwrap().unwrap();
    assert_eq!(host.role_enum(), UserRole::Host);

    let counts = db.category_repo.list_with_counts().await.unwrap();
    let hiking_count = counts.iter().find(|c| c.slug == "hiking").unwrap();
    assert_eq!(hiking_count.activity_count, 1);
}

#[sqlx::test]
async fn test_summary_enrichment_and_rating(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let host = db
        .user_repo
        .upsert_from_identity("idp|host", "host@example.com", Some("Hannah"), None)
        .await
        .unwrap();
    let category = hiking(&db).await;
    let activity = db
        .activity_repo
        .create(&new_activity(host.id, category.id, 8, Decimal::new(4500, 2)))
        .await
        .unwrap();

    for (subject, rating) in [("idp|r1", 5), ("idp|r2", 4), ("idp|r3", 4)] {
        let reviewer = db
            .user_repo
            .upsert_from_identity(subject, &format!("{}@example.com", subject), None, None)
            .await
            .unwrap();
        db.review_repo
            .create(reviewer.id, activity.id, rating, None)
            .await
            .unwrap();
    }

    let summary = db.activity_repo.find_summary(activity.id).await.unwrap().unwrap();
    assert_eq!(summary.category_label(), "Hiking");
    assert_eq!(summary.host_label(), "Hannah");
    assert_eq!(summary.review_count, 3);
    assert_eq!(summary.rating(), 4.3);

    let reviews = db.review_repo.list_for_activity(activity.id).await.unwrap();
    assert_eq!(reviews.len(), 3);
    assert!(reviews.iter().all(|r| r.reviewer_label() == "Anonymous"));
}

#[sqlx::test]
async fn test_search_and_inactive_listing(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let host = db
        .user_repo
        .upsert_from_identity("idp|host", "host@example.com", None, None)
        .await
        .unwrap();
    let category = hiking(&db).await;
    let activity = db
        .activity_repo
        .create(&new_activity(host.id, category.id, 8, Decimal::new(4500, 2)))
        .await
        .unwrap();

    let hits = db.activity_repo.search("RIDGE", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(db.activity_repo.search("kayak", None).await.unwrap().is_empty());

    db.activity_repo.set_active(activity.id, false).await.unwrap();
    assert!(db.activity_repo.search("ridge", None).await.unwrap().is_empty());
    assert!(db.activity_repo.list(None, None, None).await.unwrap().is_empty());
    assert_eq!(db.activity_repo.by_host(host.id).await.unwrap().len(), 1);
}

// ============================================================================
// Booking Repository Tests
// ============================================================================

#[sqlx::test]
async fn test_reservation_holds_and_releases_seats(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let host = db
        .user_repo
        .upsert_from_identity("idp|host", "host@example.com", None, None)
        .await
        .unwrap();
    let guest = db
        .user_repo
        .upsert_from_identity("idp|guest", "guest@example.com", None, None)
        .await
        .unwrap();
    let category = hiking(&db).await;
    let activity = db
        .activity_repo
        .create(&new_activity(host.id, category.id, 8, Decimal::new(4500, 2)))
        .await
        .unwrap();

    let input = new_booking(activity.id, 3);
    let slot = db
        .availability_repo
        .create(
            activity.id,
            &NewSlot {
                date: input.date,
                start_time: input.start(),
                end_time: input.end(),
                capacity: 4,
            },
        )
        .await
        .unwrap();

    let booking = db
        .booking_repo
        .create_with_reservation(guest.id, &input, Decimal::new(13500, 2))
        .await
        .unwrap();
    assert_eq!(booking.status_enum(), BookingStatus::Pending);

    let slot_after = db
        .availability_repo
        .list(activity.id, Some(slot.date))
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.id == slot.id)
        .unwrap();
    assert_eq!(slot_after.booked, 3);
    assert_eq!(slot_after.remaining(), 1);

    // Two more seats do not fit
    let overflow = db
        .booking_repo
        .create_with_reservation(guest.id, &new_booking(activity.id, 2), Decimal::new(9000, 2))
        .await;
    assert!(matches!(overflow, Err(RepositoryError::BusinessRule(_))));

    let transition = db
        .booking_repo
        .update_status(booking.id, BookingStatus::Cancelled)
        .await
        .unwrap();
    assert!(transition.changed());

    let slot_after = db
        .availability_repo
        .list(activity.id, Some(slot.date))
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.id == slot.id)
        .unwrap();
    assert_eq!(slot_after.booked, 0);
}

#[sqlx::test]
async fn test_resolve_only_touches_pending(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let host = db
        .user_repo
        .upsert_from_identity("idp|host", "host@example.com", None, None)
        .await
        .unwrap();
    let category = hiking(&db).await;
    let activity = db
        .activity_repo
        .create(&new_activity(host.id, category.id, 8, Decimal::new(4500, 2)))
        .await
        .unwrap();

    let mut input = new_booking(activity.id, 2);
    input.payment_intent_id = Some("pi_resolve".to_string());
    let first = db
        .booking_repo
        .create_with_reservation(host.id, &input, Decimal::new(9000, 2))
        .await
        .unwrap();
    let second = db
        .booking_repo
        .create_with_reservation(host.id, &input, Decimal::new(9000, 2))
        .await
        .unwrap();
    db.booking_repo
        .update_status(second.id, BookingStatus::Cancelled)
        .await
        .unwrap();

    let updated = db
        .booking_repo
        .resolve_pending_by_payment_intent("pi_resolve", BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].id, first.id);

    let second = db.booking_repo.find_by_id(second.id).await.unwrap().unwrap();
    assert_eq!(second.status_enum(), BookingStatus::Cancelled);
}

// ============================================================================
// Favorite / Payment Event Repository Tests
// ============================================================================

#[sqlx::test]
async fn test_favorite_add_is_idempotent(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let host = db
        .user_repo
        .upsert_from_identity("idp|host", "host@example.com", None, None)
        .await
        .unwrap();
    let category = hiking(&db).await;
    let activity = db
        .activity_repo
        .create(&new_activity(host.id, category.id, 8, Decimal::new(4500, 2)))
        .await
        .unwrap();

    let first = db.favorite_repo.add(host.id, activity.id).await.unwrap();
    let again = db.favorite_repo.add(host.id, activity.id).await.unwrap();
    assert_eq!(first.id, again.id);

    let listed = db.favorite_repo.list_by_user(host.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].favorite_id, first.id);

    assert!(db.favorite_repo.remove(host.id, activity.id).await.unwrap());
    assert!(!db.favorite_repo.remove(host.id, activity.id).await.unwrap());
}

#[sqlx::test]
async fn test_payment_event_recorded_once(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;

    assert!(db
        .payment_event_repo
        .record("evt_1", "payment_intent.succeeded", Some("pi_1"))
        .await
        .unwrap());
    assert!(!db
        .payment_event_repo
        .record("evt_1", "payment_intent.succeeded", Some("pi_1"))
        .await
        .unwrap());

    let event = db.payment_event_repo.find("evt_1").await.unwrap().unwrap();
    assert_eq!(event.payment_intent_id.as_deref(), Some("pi_1"));
}
