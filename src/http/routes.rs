use super::identity::MaybeIdentity;
use crate::error::{AppError, AppResult};
use crate::models::booking::{parse_booking_date, parse_slot_time};
use crate::models::{
    Activity, ActivityDetail, ActivityFilter, ActivityPage, AvailabilitySlot, Booking,
    BookingDetail, BookingStatus, BookingWithActivity, CategoryWithCount, FavoriteActivity,
    FavoriteToggle, NewActivity, NewBooking, NewSlot, ProfileUpdate, Review, User,
};
use crate::payment_client::SIGNATURE_HEADER;
use crate::services::{ActivityBookings, BookingScope, PaymentIntentRequest, PaymentIntentResponse};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

type SharedState = State<Arc<AppState>>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(value)| value).map_err(AppError::from)
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params.map(|Query(value)| value).map_err(AppError::from)
}

async fn caller(state: &AppState, identity: &MaybeIdentity) -> AppResult<User> {
    state.user_service.require_user(identity.as_ref()).await
}

/// Liveness plus a database round-trip
pub async fn health(State(state): SharedState) -> (StatusCode, Json<Value>) {
    let pool = state.database.status();
    match state.database.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok", "pool": pool })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unavailable", "pool": pool })),
            )
        }
    }
}

// ============================================================================
// Users
// ============================================================================

pub async fn current_user(
    State(state): SharedState,
    identity: MaybeIdentity,
) -> AppResult<Json<User>> {
    Ok(Json(caller(&state, &identity).await?))
}

pub async fn update_profile(
    State(state): SharedState,
    identity: MaybeIdentity,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> AppResult<Json<User>> {
    let update = body(payload)?;
    let caller = caller(&state, &identity).await?;
    Ok(Json(state.user_service.update_profile(&caller, update).await?))
}

// ============================================================================
// Categories
// ============================================================================

pub async fn list_categories(State(state): SharedState) -> AppResult<Json<Vec<CategoryWithCount>>> {
    Ok(Json(state.category_service.list_with_counts().await?))
}

// ============================================================================
// Activities
// ============================================================================

pub async fn browse_activities(
    State(state): SharedState,
    params: Result<Query<ActivityFilter>, QueryRejection>,
) -> AppResult<Json<ActivityPage>> {
    let filter = query(params)?;
    Ok(Json(state.activity_service.browse(&filter).await?))
}

pub async fn get_activity(
    State(state): SharedState,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActivityDetail>> {
    state
        .activity_service
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
}

pub async fn create_activity(
    State(state): SharedState,
    identity: MaybeIdentity,
    payload: Result<Json<NewActivity>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Activity>)> {
    let caller = caller(&state, &identity).await?;
    let input = body(payload)
        .map_err(|_| AppError::Validation("Invalid activity data".to_string()))?;

    let activity = state.activity_service.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub from: Option<NaiveDate>,
}

pub async fn list_availability(
    State(state): SharedState,
    Path(id): Path<Uuid>,
    params: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> AppResult<Json<Vec<AvailabilitySlot>>> {
    let from = query(params)?.from;
    Ok(Json(state.activity_service.list_availability(id, from).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotBody {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub capacity: i32,
}

pub async fn create_slot(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(id): Path<Uuid>,
    payload: Result<Json<CreateSlotBody>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AvailabilitySlot>)> {
    let caller = caller(&state, &identity).await?;
    let raw = body(payload)?;
    let slot = NewSlot {
        date: parse_booking_date(&raw.date).map_err(AppError::Validation)?,
        start_time: parse_slot_time(&raw.start_time).map_err(AppError::Validation)?,
        end_time: parse_slot_time(&raw.end_time).map_err(AppError::Validation)?,
        capacity: raw.capacity,
    };

    let created = state.activity_service.create_slot(&caller, id, slot).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn activity_bookings(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActivityBookings>> {
    let caller = caller(&state, &identity).await?;
    Ok(Json(state.booking_service.list_for_activity(&caller, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewBody {
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(id): Path<Uuid>,
    payload: Result<Json<CreateReviewBody>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let caller = caller(&state, &identity).await?;
    let raw = body(payload)?;
    let review = state
        .review_service
        .create(&caller, id, raw.rating, raw.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub scope: Option<String>,
    pub user_id: Option<Uuid>,
}

pub async fn list_bookings(
    State(state): SharedState,
    identity: MaybeIdentity,
    params: Result<Query<BookingListQuery>, QueryRejection>,
) -> AppResult<Json<Vec<BookingWithActivity>>> {
    let caller = caller(&state, &identity).await?;
    let params = query(params)?;
    let scope = params
        .scope
        .as_deref()
        .map(BookingScope::from_str)
        .transpose()
        .map_err(AppError::Validation)?
        .unwrap_or_default();

    Ok(Json(
        state
            .booking_service
            .list_for_user(&caller, params.user_id, scope)
            .await?,
    ))
}

/// Booking request body; fields arrive optional so a missing one is a 400, not a 422
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    pub activity_id: Option<Uuid>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub participants: Option<i32>,
    pub total_price: Option<Decimal>,
    pub payment_intent_id: Option<String>,
}

impl CreateBookingBody {
    pub fn into_new_booking(self) -> AppResult<NewBooking> {
        let invalid = || AppError::Validation("Invalid booking data".to_string());
        let activity_id = self.activity_id.ok_or_else(invalid)?;
        let date = self.date.as_deref().ok_or_else(invalid)?;
        let participants = self.participants.ok_or_else(invalid)?;

        let parse_time = |raw: Option<&str>| {
            raw.filter(|s| !s.trim().is_empty())
                .map(parse_slot_time)
                .transpose()
                .map_err(AppError::Validation)
        };

        Ok(NewBooking {
            activity_id,
            date: parse_booking_date(date).map_err(AppError::Validation)?,
            start_time: parse_time(self.start_time.as_deref())?,
            end_time: parse_time(self.end_time.as_deref())?,
            participants,
            total_price: self.total_price,
            payment_intent_id: self.payment_intent_id.filter(|s| !s.trim().is_empty()),
        })
    }
}

pub async fn create_booking(
    State(state): SharedState,
    identity: MaybeIdentity,
    payload: Result<Json<CreateBookingBody>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    let caller = caller(&state, &identity).await?;
    let input = body(payload)
        .map_err(|_| AppError::Validation("Invalid booking data".to_string()))?
        .into_new_booking()?;

    let booking = state.booking_service.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingDetail>> {
    let caller = caller(&state, &identity).await?;
    state
        .booking_service
        .get(&caller, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> AppResult<Json<Booking>> {
    let caller = caller(&state, &identity).await?;
    let status = BookingStatus::from_str(&body(payload)?.status).map_err(AppError::Validation)?;
    Ok(Json(
        state
            .booking_service
            .update_status(&caller, id, status)
            .await?,
    ))
}

pub async fn cancel_booking(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    let caller = caller(&state, &identity).await?;
    Ok(Json(state.booking_service.cancel(&caller, id).await?))
}

// ============================================================================
// Favorites
// ============================================================================

pub async fn list_favorites(
    State(state): SharedState,
    identity: MaybeIdentity,
) -> AppResult<Json<Vec<FavoriteActivity>>> {
    let caller = caller(&state, &identity).await?;
    Ok(Json(state.favorite_service.list(&caller).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteBody {
    pub activity_id: Uuid,
}

pub async fn toggle_favorite(
    State(state): SharedState,
    identity: MaybeIdentity,
    payload: Result<Json<FavoriteBody>, JsonRejection>,
) -> AppResult<Json<FavoriteToggle>> {
    let caller = caller(&state, &identity).await?;
    let activity_id = body(payload)?.activity_id;
    Ok(Json(state.favorite_service.toggle(&caller, activity_id).await?))
}

pub async fn remove_favorite(
    State(state): SharedState,
    identity: MaybeIdentity,
    Path(activity_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let caller = caller(&state, &identity).await?;
    let removed = state.favorite_service.remove(&caller, activity_id).await?;
    Ok(Json(json!({ "removed": removed })))
}

// ============================================================================
// Payments
// ============================================================================

pub async fn create_payment_intent(
    State(state): SharedState,
    identity: MaybeIdentity,
    payload: Result<Json<PaymentIntentRequest>, JsonRejection>,
) -> AppResult<Json<PaymentIntentResponse>> {
    let caller = caller(&state, &identity).await?;
    let request = body(payload)
        .map_err(|_| AppError::Validation("Missing required fields".to_string()))?;
    Ok(Json(
        state
            .payment_service
            .create_payment_intent(&caller, request)
            .await?,
    ))
}

/// Payment gateway webhook; the raw body is needed for signature verification
pub async fn stripe_webhook(
    State(state): SharedState,
    headers: HeaderMap,
    payload: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .payment_service
        .handle_webhook(&payload, signature)
        .await?;
    info!("Webhook handled: {:?}", outcome);

    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_body_requires_fields() {
        let body = CreateBookingBody {
            activity_id: Some(Uuid::new_v4()),
            date: None,
            participants: Some(2),
            ..Default::default()
        };
        let err = body.into_new_booking().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_booking_body_parses_camel_case() {
        let activity_id = Uuid::new_v4();
        let raw = json!({
            "activityId": activity_id,
            "date": "2030-08-15",
            "startTime": "14:30",
            "participants": 4,
            "totalPrice": 120.5,
            "paymentIntentId": "pi_123"
        });

        let body: CreateBookingBody = serde_json::from_value(raw).unwrap();
        let booking = body.into_new_booking().unwrap();
        assert_eq!(booking.activity_id, activity_id);
        assert_eq!(booking.date, NaiveDate::from_ymd_opt(2030, 8, 15).unwrap());
        assert_eq!(booking.start().format("%H:%M").to_string(), "14:30");
        assert_eq!(booking.end_time, None);
        assert_eq!(booking.total_price, Some(Decimal::new(1205, 1)));
        assert_eq!(booking.payment_intent_id.as_deref(), Some("pi_123"));
    }
}
