//! HTTP/JSON API and the payment gateway webhook

pub mod error;
pub mod identity;
pub mod routes;

use crate::AppState;
use axum::{
    http::{
        header::{CONTENT_TYPE, HeaderName},
        Method,
    },
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router over shared application state
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(identity::HEADER_SUBJECT),
            HeaderName::from_static(identity::HEADER_TIMESTAMP),
            HeaderName::from_static(identity::HEADER_SIGNATURE),
            HeaderName::from_static(identity::HEADER_EMAIL),
            HeaderName::from_static(identity::HEADER_NAME),
            HeaderName::from_static(identity::HEADER_IMAGE),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/me", get(routes::current_user).patch(routes::update_profile))
        .route("/api/categories", get(routes::list_categories))
        .route(
            "/api/activities",
            get(routes::browse_activities).post(routes::create_activity),
        )
        .route("/api/activities/:id", get(routes::get_activity))
        .route(
            "/api/activities/:id/availability",
            get(routes::list_availability).post(routes::create_slot),
        )
        .route("/api/activities/:id/bookings", get(routes::activity_bookings))
        .route("/api/activities/:id/reviews", post(routes::create_review))
        .route(
            "/api/bookings",
            get(routes::list_bookings).post(routes::create_booking),
        )
        .route("/api/bookings/:id", get(routes::get_booking))
        .route("/api/bookings/:id/status", patch(routes::update_booking_status))
        .route("/api/bookings/:id/cancel", post(routes::cancel_booking))
        .route(
            "/api/favorites",
            get(routes::list_favorites).post(routes::toggle_favorite),
        )
        .route("/api/favorites/:activity_id", delete(routes::remove_favorite))
        .route("/api/create-payment-intent", post(routes::create_payment_intent))
        .route("/api/webhooks/stripe", post(routes::stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
