use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use super::activity::UNKNOWN_HOST;

pub const UNKNOWN_USER: &str = "Unknown";
use sqlx::FromRow;
use uuid::Uuid;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    /// CANCELLED and COMPLETED never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Allowed moves. Staying in the same status is always allowed.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    /// Whether the booking still holds seats
    pub fn holds_seats(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Reservation of an activity by a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub participants: i32,
    pub total_price: Decimal, // NUMERIC(12, 2) in database
    pub status: String,        // Stored as TEXT, use BookingStatus enum for type safety
    pub payment_intent_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Get status as an enum
    pub fn status_enum(&self) -> BookingStatus {
        BookingStatus::from_str(&self.status).unwrap_or(BookingStatus::Pending)
    }

    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.date < today
    }
}

/// Result of a status change: the updated row and where it came from
#[derive(Debug, Clone)]
pub struct BookingTransition {
    pub booking: Booking,
    pub previous: BookingStatus,
}

impl BookingTransition {
    /// False when the requested status equalled the current one
    pub fn changed(&self) -> bool {
        self.booking.status_enum() != self.previous
    }
}

/// Booking listed for the person who made it
#[derive(Debug, Clone, FromRow)]
pub struct BookingWithActivity {
    #[sqlx(flatten)]
    pub booking: Booking,
    pub activity_title: String,
    pub activity_location: String,
    pub activity_images: Vec<String>,
    pub host_name: Option<String>,
    pub host_image: Option<String>,
}

impl BookingWithActivity {
    pub fn host_label(&self) -> &str {
        self.host_name.as_deref().unwrap_or(UNKNOWN_HOST)
    }
}

/// Booking listed for the host of the activity
#[derive(Debug, Clone, FromRow)]
pub struct BookingWithUser {
    #[sqlx(flatten)]
    pub booking: Booking,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_image: Option<String>,
}

impl BookingWithUser {
    pub fn user_label(&self) -> &str {
        self.user_name.as_deref().unwrap_or(UNKNOWN_USER)
    }
}

/// Single booking with everything the confirmation page shows
#[derive(Debug, Clone, FromRow)]
pub struct BookingDetail {
    #[sqlx(flatten)]
    pub booking: Booking,
    pub activity_title: String,
    pub activity_location: String,
    pub activity_description: String,
    pub activity_images: Vec<String>,
    pub activity_price: Decimal,
    pub host_id: Uuid,
    pub host_name: Option<String>,
    pub host_image: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl BookingDetail {
    pub fn host_label(&self) -> &str {
        self.host_name.as_deref().unwrap_or(UNKNOWN_HOST)
    }

    pub fn user_label(&self) -> &str {
        self.user_name.as_deref().unwrap_or(UNKNOWN_USER)
    }
}

#[derive(Serialize)]
struct BookingWithActivityView<'a> {
    #[serde(flatten)]
    booking: &'a Booking,
    activity_title: &'a str,
    activity_location: &'a str,
    activity_images: &'a [String],
    host_name: &'a str,
    host_image: &'a str,
}

impl Serialize for BookingWithActivity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BookingWithActivityView {
            booking: &self.booking,
            activity_title: &self.activity_title,
            activity_location: &self.activity_location,
            activity_images: &self.activity_images,
            host_name: self.host_label(),
            host_image: self.host_image.as_deref().unwrap_or(""),
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
struct BookingWithUserView<'a> {
    #[serde(flatten)]
    booking: &'a Booking,
    user_name: &'a str,
    user_email: &'a str,
    user_image: &'a str,
}

impl Serialize for BookingWithUser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BookingWithUserView {
            booking: &self.booking,
            user_name: self.user_label(),
            user_email: self.user_email.as_deref().unwrap_or(""),
            user_image: self.user_image.as_deref().unwrap_or(""),
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
struct BookingDetailView<'a> {
    #[serde(flatten)]
    booking: &'a Booking,
    activity_title: &'a str,
    activity_location: &'a str,
    activity_description: &'a str,
    activity_images: &'a [String],
    activity_price: Decimal,
    host_id: Uuid,
    host_name: &'a str,
    host_image: &'a str,
    user_name: &'a str,
    user_email: &'a str,
}

impl Serialize for BookingDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BookingDetailView {
            booking: &self.booking,
            activity_title: &self.activity_title,
            activity_location: &self.activity_location,
            activity_description: &self.activity_description,
            activity_images: &self.activity_images,
            activity_price: self.activity_price,
            host_id: self.host_id,
            host_name: self.host_label(),
            host_image: self.host_image.as_deref().unwrap_or(""),
            user_name: self.user_label(),
            user_email: self.user_email.as_deref().unwrap_or(""),
        }
        .serialize(serializer)
    }
}

/// Per-status counts and revenue for an activity's bookings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Sum of total_price over bookings that are not cancelled
    pub total_revenue: Decimal,
}

impl BookingSummary {
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let mut summary = Self::default();
        for booking in bookings {
            let status = booking.status_enum();
            match status {
                BookingStatus::Pending => summary.pending += 1,
                BookingStatus::Confirmed => summary.confirmed += 1,
                BookingStatus::Completed => summary.completed += 1,
                BookingStatus::Cancelled => summary.cancelled += 1,
            }
            if status.holds_seats() {
                summary.total_revenue += booking.total_price;
            }
        }
        summary
    }

    pub fn active_bookings(&self) -> usize {
        self.pending + self.confirmed + self.completed
    }
}

pub fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Input for creating a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub activity_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub participants: i32,
    /// Client-computed total, checked against the server's figure
    pub total_price: Option<Decimal>,
    pub payment_intent_id: Option<String>,
}

impl NewBooking {
    pub fn start(&self) -> NaiveTime {
        self.start_time.unwrap_or_else(default_start_time)
    }

    pub fn end(&self) -> NaiveTime {
        self.end_time.unwrap_or_else(default_end_time)
    }

    /// Checks that need no database access
    pub fn validate(&self, today: NaiveDate) -> Result<(), String> {
        if self.participants < 1 {
            return Err("participants must be at least 1".to_string());
        }
        if self.start() >= self.end() {
            return Err("start_time must be before end_time".to_string());
        }
        if self.date < today {
            return Err("booking date must not be in the past".to_string());
        }
        if let Some(total) = self.total_price {
            if total < Decimal::ZERO {
                return Err("totalPrice must be at least 0".to_string());
            }
        }
        if let Some(intent) = &self.payment_intent_id {
            if intent.trim().is_empty() {
                return Err("paymentIntentId must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Price of a booking: unit price per participant plus the flat service fee
pub fn compute_total(price: Decimal, participants: i32, service_fee: Decimal) -> Decimal {
    (price * Decimal::from(participants) + service_fee).round_dp(2)
}

/// Parse a booking date given either as `YYYY-MM-DD` or as an RFC 3339 timestamp
pub fn parse_booking_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| format!("Invalid date: {}", raw))
}

/// Parse a slot time given as `HH:MM` or `HH:MM:SS`
pub fn parse_slot_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("Invalid time: {}", raw))
}

/// Render a slot time as `HH:MM`
pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
