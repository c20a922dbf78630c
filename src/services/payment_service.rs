use super::{AuditTrailService, BookingService};
use crate::error::{AppError, AppResult};
use crate::models::booking::{compute_total, parse_booking_date};
use crate::models::{BookingStatus, User};
use crate::payment_client::{amount_to_cents, PaymentClientError, StripeClient, WebhookEvent};
use crate::repositories::{ActivityRepository, PaymentEventRepository};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Checkout request; every field is required but arrives optional from clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub activity_id: Option<Uuid>,
    pub date: Option<String>,
    pub participants: Option<i32>,
    /// Client-side total in major units; must agree with the server's figure
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: Decimal,
}

/// Booking status a payment event resolves PENDING bookings to
pub fn payment_status(event_type: &str) -> Option<BookingStatus> {
    match event_type {
        EVENT_PAYMENT_SUCCEEDED => Some(BookingStatus::Confirmed),
        EVENT_PAYMENT_FAILED => Some(BookingStatus::Cancelled),
        _ => None,
    }
}

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { bookings_updated: usize },
    Replayed,
    Ignored,
}

pub struct PaymentService {
    activity_repo: Arc<ActivityRepository>,
    payment_event_repo: Arc<PaymentEventRepository>,
    booking_service: Arc<BookingService>,
    stripe: Arc<StripeClient>,
    audit: Arc<AuditTrailService>,
}

impl PaymentService {
    pub fn new(
        activity_repo: Arc<ActivityRepository>,
        payment_event_repo: Arc<PaymentEventRepository>,
        booking_service: Arc<BookingService>,
        stripe: Arc<StripeClient>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            activity_repo,
            payment_event_repo,
            booking_service,
            stripe,
            audit,
        }
    }

    /// Create a gateway payment intent for a prospective booking
    pub async fn create_payment_intent(
        &self,
        caller: &User,
        request: PaymentIntentRequest,
    ) -> AppResult<PaymentIntentResponse> {
        let (Some(activity_id), Some(date), Some(participants)) =
            (request.activity_id, request.date.as_deref(), request.participants)
        else {
            return Err(AppError::Validation("Missing required fields".to_string()));
        };

        let date = parse_booking_date(date).map_err(AppError::Validation)?;
        if date < chrono::Utc::now().date_naive() {
            return Err(AppError::Validation(
                "booking date must not be in the past".to_string(),
            ));
        }
        if participants < 1 {
            return Err(AppError::Validation(
                "participants must be at least 1".to_string(),
            ));
        }

        let activity = self
            .activity_repo
            .find_by_id(activity_id)
            .await?
            .filter(|a| a.active)
            .ok_or_else(|| AppError::NotFound("Activity not found or not available".to_string()))?;

        if participants > activity.capacity {
            return Err(AppError::Validation(format!(
                "This activity can only accommodate up to {} participants",
                activity.capacity
            )));
        }

        let amount = compute_total(
            activity.price,
            participants,
            self.booking_service.service_fee(),
        );
        if let Some(client_amount) = request.amount {
            if client_amount.round_dp(2) != amount {
                return Err(AppError::Validation(format!(
                    "Amount {} does not match the booking total {}",
                    client_amount, amount
                )));
            }
        }

        let cents = amount_to_cents(amount)?;
        let metadata = [
            ("activity_id", activity_id.to_string()),
            ("date", date.to_string()),
            ("participants", participants.to_string()),
            ("user_id", caller.id.to_string()),
        ];

        let intent = self.stripe.create_payment_intent(cents, &metadata).await?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::ExternalService("Payment intent has no client secret".to_string())
        })?;

        Ok(PaymentIntentResponse {
            client_secret,
            payment_intent_id: intent.id,
            amount,
        })
    }

    /// Verify and apply a gateway webhook delivery
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Validation("No signature".to_string()))?;

        let event = self
            .stripe
            .construct_event(payload, signature)
            .map_err(|e| match e {
                PaymentClientError::NotConfigured => AppError::Config(
                    "STRIPE_WEBHOOK_SECRET is not configured".to_string(),
                ),
                other => {
                    warn!("Webhook signature verification failed: {}", other);
                    AppError::Validation("Invalid signature".to_string())
                }
            })?;

        self.apply_event(&event).await
    }

    /// Apply a verified event once; replays of the same event id are no-ops.
    /// The event is recorded before bookings are touched so a booking created
    /// concurrently either sees the record or is seen by the update.
    pub async fn apply_event(&self, event: &WebhookEvent) -> AppResult<WebhookOutcome> {
        let intent_id = event.payment_intent_id();
        if !self
            .payment_event_repo
            .record(&event.id, &event.event_type, intent_id)
            .await?
        {
            info!("Webhook event {} already processed", event.id);
            return Ok(WebhookOutcome::Replayed);
        }

        let outcome = match self.resolve_bookings(event, intent_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Let the gateway's retry apply it again
                if let Err(forget_err) = self.payment_event_repo.forget(&event.id).await {
                    warn!("Failed to release event {}: {}", event.id, forget_err);
                }
                return Err(e);
            }
        };

        let bookings_updated = match &outcome {
            WebhookOutcome::Processed { bookings_updated } => *bookings_updated,
            _ => 0,
        };
        if let Err(e) = self
            .audit
            .log_payment_event(&event.id, &event.event_type, intent_id, bookings_updated)
            .await
        {
            warn!("Failed to write audit entry for event {}: {}", event.id, e);
        }

        Ok(outcome)
    }

    async fn resolve_bookings(
        &self,
        event: &WebhookEvent,
        intent_id: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let next = match payment_status(&event.event_type) {
            Some(status) => status,
            None => {
                info!("Unhandled event type: {}", event.event_type);
                return Ok(WebhookOutcome::Ignored);
            }
        };
        let Some(intent_id) = intent_id else {
            return Ok(WebhookOutcome::Ignored);
        };

        let updated = self
            .booking_service
            .apply_payment_result(intent_id, next)
            .await?;
        if updated.is_empty() {
            // Booking not posted yet; BookingService::create settles it from the record
            info!(
                "Payment {} for intent {} matched no pending booking yet",
                event.event_type, intent_id
            );
        } else {
            info!(
                "Payment {} for intent {}: {} booking(s) -> {}",
                event.event_type,
                intent_id,
                updated.len(),
                next.as_str()
            );
        }
        Ok(WebhookOutcome::Processed {
            bookings_updated: updated.len(),
        })
    }
}
