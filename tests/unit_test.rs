use chrono::NaiveDate;
use movinature_backend::auth::{Identity, IdentityVerifier};
use movinature_backend::config::{AppConfig, AuthConfig, PaymentConfig};
use movinature_backend::error::AppError;
use movinature_backend::models::booking::{compute_total, parse_booking_date, parse_slot_time};
use movinature_backend::models::*;
use movinature_backend::payment_client::{
    amount_to_cents, sign_webhook_payload, StripeClient, WebhookEvent,
};
use movinature_backend::websocket::{activity_channel, is_valid_channel, user_channel};
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

const SECRET: &str = "unit-test-secret";

fn signed_identity(subject: &str, timestamp: i64) -> Identity {
    Identity {
        subject: subject.to_string(),
        email: Some("parent@example.com".to_string()),
        name: None,
        picture_url: None,
        timestamp,
        signature: String::new(),
    }
    .signed(SECRET)
    .unwrap()
}

fn verifier() -> IdentityVerifier {
    IdentityVerifier::new(&AuthConfig {
        identity_secret: Some(SECRET.to_string()),
        max_clock_skew_secs: 300,
        allow_unsigned: false,
    })
}

#[test]
fn test_booking_status_transition_table() {
    use BookingStatus::*;

    assert!(Pending.can_transition_to(Confirmed));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Confirmed.can_transition_to(Completed));
    assert!(Confirmed.can_transition_to(Cancelled));

    assert!(!Pending.can_transition_to(Completed));
    assert!(!Cancelled.can_transition_to(Confirmed));
    assert!(!Completed.can_transition_to(Cancelled));
    assert!(Cancelled.is_terminal());
    assert!(Completed.is_terminal());
}

#[test]
fn test_booking_status_conversion() {
    assert_eq!(BookingStatus::from_str("confirmed"), Ok(BookingStatus::Confirmed));
    assert_eq!(BookingStatus::Cancelled.as_str(), "CANCELLED");
    assert!(BookingStatus::from_str("REFUNDED").is_err());
}

#[test]
fn test_total_includes_service_fee() {
    let total = compute_total(Decimal::new(3999, 2), 3, Decimal::new(250, 2));
    assert_eq!(total, Decimal::new(12247, 2));
}

#[test]
fn test_date_and_time_parsing() {
    assert_eq!(
        parse_booking_date("2030-03-01T00:00:00.000Z").unwrap(),
        NaiveDate::from_ymd_opt(2030, 3, 1).unwrap()
    );
    assert!(parse_booking_date("next tuesday").is_err());
    assert!(parse_slot_time("25:00").is_err());
    assert_eq!(
        parse_slot_time("09:30:00").unwrap().format("%H:%M").to_string(),
        "09:30"
    );
}

#[test]
fn test_identity_signature_roundtrip() {
    let now = 1_800_000_000;
    let identity = signed_identity("idp|parent", now);
    assert_ok!(verifier().verify_at(&identity, now + 10));

    let mut forged = identity.clone();
    forged.subject = "idp|someone-else".to_string();
    assert!(matches!(
        verifier().verify_at(&forged, now),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn test_identity_expires() {
    let identity = signed_identity("idp|parent", 1_800_000_000);
    assert_err!(verifier().verify_at(&identity, 1_800_000_000 + 301));
}

#[test]
fn test_webhook_signature_verification() {
    let client = StripeClient::with_config(PaymentConfig {
        webhook_secret: Some("whsec_unit".to_string()),
        ..PaymentConfig::default()
    });
    let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","object":"payment_intent"}}}"#;
    let now = 1_800_000_000;

    let header = sign_webhook_payload(payload, "whsec_unit", now);
    let event: WebhookEvent = client.construct_event_at(payload, &header, now).unwrap();
    assert_eq!(event.event_type, "payment_intent.succeeded");
    assert_eq!(event.payment_intent_id(), Some("pi_1"));

    let wrong_secret = sign_webhook_payload(payload, "whsec_other", now);
    assert_err!(client.construct_event_at(payload, &wrong_secret, now));

    // Stale beyond the 300 s tolerance
    assert!(client.construct_event_at(payload, &header, now + 301).is_err());
}

#[test]
fn test_amount_to_cents() {
    assert_eq!(amount_to_cents(Decimal::new(12345, 3)).unwrap(), 1235);
    assert_eq!(amount_to_cents(Decimal::new(50, 0)).unwrap(), 5000);
    assert!(amount_to_cents(Decimal::new(-1, 0)).is_err());
}

#[test]
fn test_channels() {
    let id = Uuid::new_v4();
    assert!(is_valid_channel(&activity_channel(id)));
    assert!(is_valid_channel(&user_channel(id)));
    assert!(!is_valid_channel("bookings"));
}

#[test]
fn test_config_validation() {
    assert_ok!(AppConfig::default().validate());

    let config = AppConfig {
        log_level: "verbose".to_string(),
        ..AppConfig::default()
    };
    assert!(config.validate().is_err());

    let config = AppConfig {
        environment: "qa".to_string(),
        ..AppConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_error_status_codes() {
    assert_eq!(AppError::Validation("x".into()).status_code(), 400);
    assert_eq!(AppError::Unauthorized("x".into()).status_code(), 401);
    assert_eq!(AppError::Forbidden("x".into()).status_code(), 403);
    assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
    assert_eq!(AppError::Conflict("x".into()).status_code(), 409);
}
