use super::{ensure_host_or_admin, AuditTrailService};
use crate::email_client::{BookingConfirmation, ResendClient};
use crate::error::{AppError, AppResult};
use crate::models::booking::compute_total;
use crate::models::{
    Booking, BookingDetail, BookingStatus, BookingSummary, BookingTransition, BookingWithActivity,
    BookingWithUser, NewBooking, User,
};
use super::payment_service::{payment_status, EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED};
use crate::repositories::{ActivityRepository, BookingRepository, PaymentEventRepository};
use crate::websocket::WebSocketServer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which of a user's bookings to list, relative to today
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingScope {
    #[default]
    All,
    Upcoming,
    Past,
}

impl BookingScope {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "" | "all" => Ok(BookingScope::All),
            "upcoming" => Ok(BookingScope::Upcoming),
            "past" => Ok(BookingScope::Past),
            _ => Err(format!("Invalid scope: {}", s)),
        }
    }

    pub fn includes(&self, booking: &Booking, today: chrono::NaiveDate) -> bool {
        match self {
            BookingScope::All => true,
            BookingScope::Upcoming => !booking.is_past(today),
            BookingScope::Past => booking.is_past(today),
        }
    }
}

/// Bookings of one activity as the host sees them
#[derive(Debug, Clone, Serialize)]
pub struct ActivityBookings {
    pub bookings: Vec<BookingWithUser>,
    pub summary: BookingSummary,
}

/// Service owning the booking lifecycle
pub struct BookingService {
    booking_repo: Arc<BookingRepository>,
    activity_repo: Arc<ActivityRepository>,
    payment_event_repo: Arc<PaymentEventRepository>,
    ws_server: Arc<WebSocketServer>,
    audit: Arc<AuditTrailService>,
    email: Arc<ResendClient>,
    service_fee: Decimal,
}

impl BookingService {
    pub fn new(
        booking_repo: Arc<BookingRepository>,
        activity_repo: Arc<ActivityRepository>,
        payment_event_repo: Arc<PaymentEventRepository>,
        ws_server: Arc<WebSocketServer>,
        audit: Arc<AuditTrailService>,
        email: Arc<ResendClient>,
        service_fee: Decimal,
    ) -> Self {
        Self {
            booking_repo,
            activity_repo,
            payment_event_repo,
            ws_server,
            audit,
            email,
            service_fee,
        }
    }

    pub fn service_fee(&self) -> Decimal {
        self.service_fee
    }

    /// Book an activity for the caller. The booking starts PENDING unless its
    /// payment intent has already been reported as succeeded or failed.
    pub async fn create(&self, caller: &User, input: NewBooking) -> AppResult<Booking> {
        info!(
            "Creating booking: activity={}, user={}, participants={}",
            input.activity_id, caller.id, input.participants
        );

        input
            .validate(chrono::Utc::now().date_naive())
            .map_err(AppError::Validation)?;

        let activity = self
            .activity_repo
            .find_by_id(input.activity_id)
            .await?
            .filter(|a| a.active)
            .ok_or_else(|| AppError::NotFound("Activity not found or not available".to_string()))?;

        if input.participants > activity.capacity {
            return Err(AppError::Validation(format!(
                "This activity can only accommodate up to {} participants",
                activity.capacity
            )));
        }

        let total_price = compute_total(activity.price, input.participants, self.service_fee);
        if let Some(client_total) = input.total_price {
            if client_total != total_price {
                warn!(
                    "Client total {} differs from computed total {} for activity {}",
                    client_total, total_price, activity.id
                );
            }
        }

        let booking = self
            .booking_repo
            .create_with_reservation(caller.id, &input, total_price)
            .await?;

        info!("✅ Booking {} created ({})", booking.id, booking.total_price);

        self.ws_server.notify_booking_created(&booking).await;
        if let Err(e) = self.audit.log_booking_created(&booking).await {
            warn!("Failed to write audit entry for booking {}: {}", booking.id, e);
        }

        self.settle_recorded_payment(booking).await
    }

    /// Apply a payment webhook that arrived before the booking was posted
    async fn settle_recorded_payment(&self, booking: Booking) -> AppResult<Booking> {
        let Some(intent_id) = booking.payment_intent_id.clone() else {
            return Ok(booking);
        };
        let Some(event) = self
            .payment_event_repo
            .latest_for_intent(&intent_id, &[EVENT_PAYMENT_SUCCEEDED, EVENT_PAYMENT_FAILED])
            .await?
        else {
            return Ok(booking);
        };
        let Some(status) = payment_status(&event.event_type) else {
            return Ok(booking);
        };

        info!(
            "Booking {} settled from earlier event {} ({})",
            booking.id, event.id, event.event_type
        );
        let updated = self.apply_payment_result(&intent_id, status).await?;
        Ok(updated
            .into_iter()
            .find(|b| b.id == booking.id)
            .unwrap_or(booking))
    }

    /// Bookings made by `user_id` (the caller when None); admins may list anyone's
    pub async fn list_for_user(
        &self,
        caller: &User,
        user_id: Option<Uuid>,
        scope: BookingScope,
    ) -> AppResult<Vec<BookingWithActivity>> {
        let user_id = user_id.unwrap_or(caller.id);
        if user_id != caller.id && !caller.is_admin() {
            return Err(AppError::Forbidden(
                "You can only view your own bookings".to_string(),
            ));
        }

        let today = chrono::Utc::now().date_naive();
        let bookings = self.booking_repo.list_by_user(user_id).await?;
        Ok(bookings
            .into_iter()
            .filter(|b| scope.includes(&b.booking, today))
            .collect())
    }

    /// Host view of an activity's bookings with per-status counts and revenue
    pub async fn list_for_activity(
        &self,
        caller: &User,
        activity_id: Uuid,
    ) -> AppResult<ActivityBookings> {
        let activity = self
            .activity_repo
            .find_by_id(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;
        ensure_host_or_admin(caller, activity.host_id)?;

        let bookings = self.booking_repo.list_by_activity(activity_id).await?;
        let summary = BookingSummary::from_bookings(bookings.iter().map(|b| &b.booking));
        Ok(ActivityBookings { bookings, summary })
    }

    /// Booking detail, visible to the booker, the host and admins
    pub async fn get(&self, caller: &User, id: Uuid) -> AppResult<Option<BookingDetail>> {
        let Some(detail) = self.booking_repo.find_detail(id).await? else {
            return Ok(None);
        };

        let allowed = detail.booking.user_id == caller.id
            || detail.host_id == caller.id
            || caller.is_admin();
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this booking".to_string(),
            ));
        }

        Ok(Some(detail))
    }

    /// Host or admin moves a booking along its lifecycle
    pub async fn update_status(
        &self,
        caller: &User,
        id: Uuid,
        status: BookingStatus,
    ) -> AppResult<Booking> {
        let booking = self.require_booking(id).await?;
        let host_id = self.host_of(&booking).await?;
        ensure_host_or_admin(caller, host_id)?;

        let transition = self.booking_repo.update_status(id, status).await?;
        self.after_transition(&transition, Some(caller.id)).await;
        Ok(transition.booking)
    }

    /// Booker, host or admin cancels a booking
    pub async fn cancel(&self, caller: &User, id: Uuid) -> AppResult<Booking> {
        let booking = self.require_booking(id).await?;
        if booking.user_id != caller.id {
            let host_id = self.host_of(&booking).await?;
            ensure_host_or_admin(caller, host_id)?;
        }

        let transition = self
            .booking_repo
            .update_status(id, BookingStatus::Cancelled)
            .await?;
        self.after_transition(&transition, Some(caller.id)).await;
        Ok(transition.booking)
    }

    /// Resolve the PENDING bookings paid with a payment intent
    pub async fn apply_payment_result(
        &self,
        payment_intent_id: &str,
        status: BookingStatus,
    ) -> AppResult<Vec<Booking>> {
        let updated = self
            .booking_repo
            .resolve_pending_by_payment_intent(payment_intent_id, status)
            .await?;

        for booking in &updated {
            let transition = BookingTransition {
                booking: booking.clone(),
                previous: BookingStatus::Pending,
            };
            self.after_transition(&transition, None).await;
        }

        Ok(updated)
    }

    /// Send the confirmation email for a booking. Failures are logged, never returned.
    pub async fn send_confirmation(&self, booking_id: Uuid) {
        let detail = match self.booking_repo.find_detail(booking_id).await {
            Ok(Some(detail)) => detail,
            Ok(None) => {
                warn!("Booking {} vanished before its confirmation email", booking_id);
                return;
            }
            Err(e) => {
                warn!("Could not load booking {} for email: {}", booking_id, e);
                return;
            }
        };

        let Some(to) = detail.user_email.clone() else {
            debug!("Booking {} has no booker email, skipping confirmation", booking_id);
            return;
        };

        let message = BookingConfirmation {
            to,
            user_name: detail.user_name.clone(),
            activity_title: detail.activity_title.clone(),
            activity_location: detail.activity_location.clone(),
            date: detail.booking.date,
            participants: detail.booking.participants,
            total_price: detail.booking.total_price,
            booking_id,
        }
        .render(self.email.from_email());

        if let Err(e) = self.email.send(&message).await {
            warn!("Failed to send confirmation email for booking {}: {}", booking_id, e);
        }
    }

    async fn require_booking(&self, id: Uuid) -> AppResult<Booking> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    async fn host_of(&self, booking: &Booking) -> AppResult<Uuid> {
        self.activity_repo
            .find_by_id(booking.activity_id)
            .await?
            .map(|a| a.host_id)
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
    }

    /// Push, audit and email after a status change
    async fn after_transition(&self, transition: &BookingTransition, actor: Option<Uuid>) {
        if !transition.changed() {
            return;
        }
        let booking = &transition.booking;

        info!(
            "Booking {} status {} -> {}",
            booking.id,
            transition.previous.as_str(),
            booking.status
        );

        self.ws_server
            .notify_status_changed(booking, transition.previous)
            .await;

        if let Err(e) = self
            .audit
            .log_status_changed(booking, transition.previous, actor)
            .await
        {
            warn!("Failed to write audit entry for booking {}: {}", booking.id, e);
        }

        if booking.status_enum() == BookingStatus::Confirmed {
            self.send_confirmation(booking.id).await;
        }
    }
}
