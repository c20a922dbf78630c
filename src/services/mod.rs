pub mod activity_service;
pub mod audit;
pub mod booking_service;
pub mod category_service;
pub mod favorite_service;
pub mod payment_service;
pub mod review_service;
pub mod user_service;

pub use activity_service::ActivityService;
pub use audit::AuditTrailService;
pub use booking_service::{ActivityBookings, BookingScope, BookingService};
pub use category_service::CategoryService;
pub use favorite_service::FavoriteService;
pub use payment_service::{PaymentIntentRequest, PaymentIntentResponse, PaymentService, WebhookOutcome};
pub use review_service::ReviewService;
pub use user_service::UserService;

use crate::error::{AppError, AppResult};
use crate::models::User;
use uuid::Uuid;

/// Only the owning host or an admin may manage an activity and its bookings
pub fn ensure_host_or_admin(caller: &User, host_id: Uuid) -> AppResult<()> {
    if caller.id == host_id || caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the activity host can do this".to_string(),
        ))
    }
}
