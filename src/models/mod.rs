//! Domain models for the Movinature backend.
//!
//! This module contains all database-backed models representing
//! the core entities of the activity marketplace.

pub mod activity;
pub mod activity_filter;
pub mod availability;
pub mod booking;
pub mod category;
pub mod favorite;
pub mod payment_event;
pub mod review;
pub mod user;

// Re-export all models for convenient access
pub use activity::{Activity, ActivityDetail, ActivitySummary, NewActivity};
pub use activity_filter::{ActivityFilter, ActivityPage, ActivitySort, Audience};
pub use availability::{AvailabilitySlot, NewSlot};
pub use booking::{
    Booking, BookingDetail, BookingStatus, BookingSummary, BookingTransition, BookingWithActivity,
    BookingWithUser, NewBooking,
};
pub use category::{Category, CategoryWithCount};
pub use favorite::{Favorite, FavoriteAction, FavoriteActivity, FavoriteToggle};
pub use payment_event::PaymentEvent;
pub use review::{Review, ReviewWithUser};
pub use user::{ProfileUpdate, User, UserRole};
