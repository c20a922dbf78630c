//! Movinature Backend Library
//!
//! This module exposes the backend components for use by tests and other consumers.

pub mod auth;
pub mod config;
pub mod database;
pub mod email_client;
pub mod error;
pub mod grpc_service;
pub mod http;
pub mod models;
pub mod payment_client;
pub mod repositories;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::IdentityVerifier;
use database::Database;
use email_client::ResendClient;
use payment_client::StripeClient;
use repositories::*;
use services::*;
use std::path::PathBuf;
use std::sync::Arc;
use websocket::{ChannelAuthorizer, WebSocketServer};

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub user_repo: Arc<UserRepository>,
    pub category_repo: Arc<CategoryRepository>,
    pub activity_repo: Arc<ActivityRepository>,
    pub availability_repo: Arc<AvailabilityRepository>,
    pub booking_repo: Arc<BookingRepository>,
    pub favorite_repo: Arc<FavoriteRepository>,
    pub review_repo: Arc<ReviewRepository>,
    pub payment_event_repo: Arc<PaymentEventRepository>,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub activity_service: Arc<ActivityService>,
    pub booking_service: Arc<BookingService>,
    pub favorite_service: Arc<FavoriteService>,
    pub review_service: Arc<ReviewService>,
    pub payment_service: Arc<PaymentService>,
    pub ws_server: Arc<WebSocketServer>,
    pub audit: Arc<AuditTrailService>,
}

impl AppState {
    /// Wire repositories, clients and services over one pool
    pub fn new(pool: sqlx::PgPool, config: &AppConfig) -> AppResult<Self> {
        let database = Database::new(pool.clone());

        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let category_repo = Arc::new(CategoryRepository::new(pool.clone()));
        let activity_repo = Arc::new(ActivityRepository::new(pool.clone()));
        let availability_repo = Arc::new(AvailabilityRepository::new(pool.clone()));
        let booking_repo = Arc::new(BookingRepository::new(pool.clone()));
        let favorite_repo = Arc::new(FavoriteRepository::new(pool.clone()));
        let review_repo = Arc::new(ReviewRepository::new(pool.clone()));
        let payment_event_repo = Arc::new(PaymentEventRepository::new(pool));

        let audit = Arc::new(AuditTrailService::new(PathBuf::from(&config.audit_log_dir))?);
        let stripe = Arc::new(StripeClient::with_config(config.payment.clone()));
        let email = Arc::new(ResendClient::with_config(config.email.clone()));

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            IdentityVerifier::new(&config.auth),
        ));
        let ws_server = Arc::new(WebSocketServer::with_authorizer(ChannelAuthorizer::new(
            user_service.clone(),
            activity_repo.clone(),
        )));
        let category_service = Arc::new(CategoryService::new(category_repo.clone()));
        let activity_service = Arc::new(ActivityService::new(
            activity_repo.clone(),
            category_repo.clone(),
            review_repo.clone(),
            availability_repo.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            activity_repo.clone(),
            payment_event_repo.clone(),
            ws_server.clone(),
            audit.clone(),
            email,
            config.payment.service_fee,
        ));
        let favorite_service = Arc::new(FavoriteService::new(
            favorite_repo.clone(),
            activity_repo.clone(),
        ));
        let review_service = Arc::new(ReviewService::new(
            review_repo.clone(),
            activity_repo.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            activity_repo.clone(),
            payment_event_repo.clone(),
            booking_service.clone(),
            stripe,
            audit.clone(),
        ));

        Ok(Self {
            database,
            user_repo,
            category_repo,
            activity_repo,
            availability_repo,
            booking_repo,
            favorite_repo,
            review_repo,
            payment_event_repo,
            user_service,
            category_service,
            activity_service,
            booking_service,
            favorite_service,
            review_service,
            payment_service,
            ws_server,
            audit,
        })
    }
}
