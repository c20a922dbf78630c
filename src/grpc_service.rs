//! gRPC service implementation for Movinature
//!
//! This module implements the MarketplaceService gRPC handlers using tonic.
//! The proto definitions are compiled at build time via build.rs.

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::booking::{format_slot_time, parse_booking_date, parse_slot_time};
use crate::models::{self, ActivityFilter, ActivitySort, Audience, BookingStatus, NewActivity, NewBooking, NewSlot, ProfileUpdate, User, UserRole};
use crate::services::{BookingScope, PaymentIntentRequest};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info};
use uuid::Uuid;

pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/movinature.rs"));

    /// File descriptor set for gRPC reflection
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        include_bytes!(concat!(env!("OUT_DIR"), "/movinature_descriptor.bin"));
}

use proto::get_category_request::Key as CategoryKey;
use proto::marketplace_service_server::{MarketplaceService, MarketplaceServiceServer};

/// gRPC service implementation
pub struct MarketplaceGrpcService {
    app_state: Arc<crate::AppState>,
}

impl MarketplaceGrpcService {
    pub fn new(app_state: Arc<crate::AppState>) -> Self {
        Self { app_state }
    }

    /// Create a tonic server for this service
    pub fn into_server(self) -> MarketplaceServiceServer<Self> {
        MarketplaceServiceServer::new(self)
    }

    /// Convert AppError to tonic Status
    fn to_status(err: AppError) -> Status {
        match err {
            AppError::NotFound(msg) => Status::not_found(msg),
            AppError::Unauthorized(msg) => Status::unauthenticated(msg),
            AppError::Forbidden(msg) => Status::permission_denied(msg),
            AppError::Validation(msg) => Status::invalid_argument(msg),
            AppError::Duplicate(msg) => Status::already_exists(msg),
            AppError::Conflict(msg) => Status::failed_precondition(msg),
            AppError::ExternalService(msg) => {
                error!("External service error: {}", msg);
                Status::unavailable("Upstream service unavailable")
            }
            AppError::Database(_) | AppError::Sqlx(_) => {
                error!("Database error: {:?}", err);
                Status::internal("Database error")
            }
            _ => {
                error!("Internal error: {:?}", err);
                Status::internal("Internal server error")
            }
        }
    }

    /// Helper to parse UUID from string
    fn parse_uuid(s: &str, field_name: &str) -> Result<Uuid, Status> {
        Uuid::parse_str(s)
            .map_err(|_| Status::invalid_argument(format!("Invalid {}: {}", field_name, s)))
    }

    fn parse_optional_uuid(s: Option<&str>, field_name: &str) -> Result<Option<Uuid>, Status> {
        s.filter(|s| !s.is_empty())
            .map(|s| Self::parse_uuid(s, field_name))
            .transpose()
    }

    fn parse_decimal(s: &str, field_name: &str) -> Result<Decimal, Status> {
        Decimal::from_str(s.trim())
            .map_err(|_| Status::invalid_argument(format!("Invalid {}: {}", field_name, s)))
    }

    fn parse_optional_decimal(s: Option<&str>, field_name: &str) -> Result<Option<Decimal>, Status> {
        s.filter(|s| !s.trim().is_empty())
            .map(|s| Self::parse_decimal(s, field_name))
            .transpose()
    }

    /// Resolve the caller, creating the local user on first sight
    async fn caller(&self, identity: Option<proto::Identity>) -> Result<User, Status> {
        let identity = identity.map(Identity::from);
        self.app_state
            .user_service
            .require_user(identity.as_ref())
            .await
            .map_err(Self::to_status)
    }
}

fn timestamp(at: chrono::NaiveDateTime) -> i64 {
    at.and_utc().timestamp()
}

impl From<proto::Identity> for Identity {
    fn from(identity: proto::Identity) -> Self {
        Identity {
            subject: identity.subject,
            email: identity.email,
            name: identity.name,
            picture_url: identity.picture_url,
            timestamp: identity.timestamp,
            signature: identity.signature,
        }
    }
}

impl From<User> for proto::User {
    fn from(user: User) -> Self {
        proto::User {
            id: user.id.to_string(),
            external_id: user.external_id,
            email: user.email,
            name: user.name,
            image: user.image,
            bio: user.bio,
            phone: user.phone,
            role: user.role,
            created_at: timestamp(user.created_at),
            updated_at: timestamp(user.updated_at),
        }
    }
}

impl From<models::Category> for proto::Category {
    fn from(category: models::Category) -> Self {
        proto::Category {
            id: category.id.to_string(),
            name: category.name,
            slug: category.slug,
            icon: category.icon,
        }
    }
}

impl From<models::CategoryWithCount> for proto::CategoryWithCount {
    fn from(category: models::CategoryWithCount) -> Self {
        proto::CategoryWithCount {
            category: Some(proto::Category {
                id: category.id.to_string(),
                name: category.name,
                slug: category.slug,
                icon: category.icon,
            }),
            activity_count: category.activity_count,
        }
    }
}

impl From<models::Activity> for proto::Activity {
    fn from(activity: models::Activity) -> Self {
        proto::Activity {
            id: activity.id.to_string(),
            title: activity.title,
            description: activity.description,
            location: activity.location,
            address: activity.address,
            latitude: activity.latitude,
            longitude: activity.longitude,
            price: activity.price.to_string(),
            duration_minutes: activity.duration_minutes,
            min_age: activity.min_age,
            max_age: activity.max_age,
            capacity: activity.capacity,
            images: activity.images,
            featured: activity.featured,
            active: activity.active,
            host_id: activity.host_id.to_string(),
            category_id: activity.category_id.to_string(),
            created_at: timestamp(activity.created_at),
            updated_at: timestamp(activity.updated_at),
        }
    }
}

impl From<models::ActivitySummary> for proto::ActivitySummary {
    fn from(summary: models::ActivitySummary) -> Self {
        let category_name = summary.category_label().to_string();
        let category_slug = summary.category_slug_label().to_string();
        let host_name = summary.host_label().to_string();
        let host_image = summary.host_image_url().to_string();
        let rating = summary.rating();
        proto::ActivitySummary {
            category_name,
            category_slug,
            host_name,
            host_image,
            host_bio: summary.host_bio,
            rating,
            review_count: summary.review_count,
            activity: Some(summary.activity.into()),
        }
    }
}

impl From<models::ReviewWithUser> for proto::Review {
    fn from(review: models::ReviewWithUser) -> Self {
        let reviewer_name = review.reviewer_label().to_string();
        proto::Review {
            id: review.id.to_string(),
            rating: review.rating.into(),
            comment: review.comment,
            reviewer_name,
            reviewer_image: review.reviewer_image.unwrap_or_default(),
            created_at: timestamp(review.created_at),
        }
    }
}

impl From<models::AvailabilitySlot> for proto::AvailabilitySlot {
    fn from(slot: models::AvailabilitySlot) -> Self {
        let remaining = slot.remaining();
        proto::AvailabilitySlot {
            id: slot.id.to_string(),
            activity_id: slot.activity_id.to_string(),
            date: slot.date.to_string(),
            start_time: format_slot_time(slot.start_time),
            end_time: format_slot_time(slot.end_time),
            capacity: slot.capacity,
            booked: slot.booked,
            remaining,
        }
    }
}

impl From<models::Booking> for proto::Booking {
    fn from(booking: models::Booking) -> Self {
        proto::Booking {
            id: booking.id.to_string(),
            activity_id: booking.activity_id.to_string(),
            user_id: booking.user_id.to_string(),
            date: booking.date.to_string(),
            start_time: format_slot_time(booking.start_time),
            end_time: format_slot_time(booking.end_time),
            participants: booking.participants,
            total_price: booking.total_price.to_string(),
            status: booking.status,
            payment_intent_id: booking.payment_intent_id,
            created_at: timestamp(booking.created_at),
            updated_at: timestamp(booking.updated_at),
        }
    }
}

impl From<models::BookingWithActivity> for proto::UserBooking {
    fn from(row: models::BookingWithActivity) -> Self {
        let host_name = row.host_label().to_string();
        proto::UserBooking {
            booking: Some(row.booking.into()),
            activity_title: row.activity_title,
            activity_location: row.activity_location,
            activity_images: row.activity_images,
            host_name,
            host_image: row.host_image.unwrap_or_default(),
        }
    }
}

impl From<models::BookingWithUser> for proto::ActivityBooking {
    fn from(row: models::BookingWithUser) -> Self {
        let user_name = row.user_label().to_string();
        proto::ActivityBooking {
            booking: Some(row.booking.into()),
            user_name,
            user_email: row.user_email.unwrap_or_default(),
            user_image: row.user_image.unwrap_or_default(),
        }
    }
}

impl From<models::BookingDetail> for proto::BookingDetail {
    fn from(row: models::BookingDetail) -> Self {
        let host_name = row.host_label().to_string();
        let user_name = row.user_label().to_string();
        proto::BookingDetail {
            booking: Some(row.booking.into()),
            activity_title: row.activity_title,
            activity_location: row.activity_location,
            activity_description: row.activity_description,
            activity_images: row.activity_images,
            activity_price: row.activity_price.to_string(),
            host_id: row.host_id.to_string(),
            host_name,
            host_image: row.host_image.unwrap_or_default(),
            user_name,
            user_email: row.user_email.unwrap_or_default(),
        }
    }
}

impl From<models::BookingSummary> for proto::BookingStatusCounts {
    fn from(summary: models::BookingSummary) -> Self {
        proto::BookingStatusCounts {
            pending: summary.pending as u64,
            confirmed: summary.confirmed as u64,
            completed: summary.completed as u64,
            cancelled: summary.cancelled as u64,
            total_revenue: summary.total_revenue.to_string(),
        }
    }
}

fn activity_list(items: Vec<models::ActivitySummary>) -> proto::ActivityList {
    proto::ActivityList {
        activities: items.into_iter().map(Into::into).collect(),
    }
}

#[tonic::async_trait]
impl MarketplaceService for MarketplaceGrpcService {
    // ========================================================================
    // Users
    // ========================================================================

    async fn store_user(
        &self,
        request: Request<proto::StoreUserRequest>,
    ) -> Result<Response<proto::UserResponse>, Status> {
        let req = request.into_inner();
        let identity = req
            .identity
            .map(Identity::from)
            .ok_or_else(|| Status::unauthenticated("Missing identity"))?;

        let user = self
            .app_state
            .user_service
            .store(&identity)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::UserResponse {
            user: Some(user.into()),
        }))
    }

    async fn get_current_user(
        &self,
        request: Request<proto::GetCurrentUserRequest>,
    ) -> Result<Response<proto::UserLookup>, Status> {
        let identity = request.into_inner().identity.map(Identity::from);
        let user = self
            .app_state
            .user_service
            .current_user(identity.as_ref())
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::UserLookup {
            user: user.map(Into::into),
        }))
    }

    async fn get_user(
        &self,
        request: Request<proto::GetUserRequest>,
    ) -> Result<Response<proto::UserLookup>, Status> {
        let req = request.into_inner();
        let user_id = Self::parse_uuid(&req.user_id, "user_id")?;
        let user = self
            .app_state
            .user_service
            .get_by_id(user_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::UserLookup {
            user: user.map(Into::into),
        }))
    }

    async fn update_profile(
        &self,
        request: Request<proto::UpdateProfileRequest>,
    ) -> Result<Response<proto::UserResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let user = self
            .app_state
            .user_service
            .update_profile(
                &caller,
                ProfileUpdate {
                    bio: req.bio,
                    phone: req.phone,
                },
            )
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::UserResponse {
            user: Some(user.into()),
        }))
    }

    async fn update_role(
        &self,
        request: Request<proto::UpdateRoleRequest>,
    ) -> Result<Response<proto::UserResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let user_id = Self::parse_uuid(&req.user_id, "user_id")?;
        let role = UserRole::from_str(&req.role).map_err(Status::invalid_argument)?;

        let user = self
            .app_state
            .user_service
            .update_role(&caller, user_id, role)
            .await
            .map_err(Self::to_status)?;

        info!("User {} role set to {} by {}", user.id, user.role, caller.id);
        Ok(Response::new(proto::UserResponse {
            user: Some(user.into()),
        }))
    }

    // ========================================================================
    // Categories
    // ========================================================================

    async fn list_categories(
        &self,
        _request: Request<proto::ListCategoriesRequest>,
    ) -> Result<Response<proto::CategoryList>, Status> {
        let categories = self
            .app_state
            .category_service
            .list()
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::CategoryList {
            categories: categories.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_category(
        &self,
        request: Request<proto::GetCategoryRequest>,
    ) -> Result<Response<proto::CategoryLookup>, Status> {
        let category = match request.into_inner().key {
            Some(CategoryKey::Id(id)) => {
                let id = Self::parse_uuid(&id, "id")?;
                self.app_state.category_service.get_by_id(id).await
            }
            Some(CategoryKey::Slug(slug)) => {
                self.app_state.category_service.get_by_slug(&slug).await
            }
            None => return Err(Status::invalid_argument("id or slug is required")),
        }
        .map_err(Self::to_status)?;

        Ok(Response::new(proto::CategoryLookup {
            category: category.map(Into::into),
        }))
    }

    async fn list_categories_with_counts(
        &self,
        _request: Request<proto::ListCategoriesRequest>,
    ) -> Result<Response<proto::CategoryCountList>, Status> {
        let categories = self
            .app_state
            .category_service
            .list_with_counts()
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::CategoryCountList {
            categories: categories.into_iter().map(Into::into).collect(),
        }))
    }

    // ========================================================================
    // Activities
    // ========================================================================

    async fn list_activities(
        &self,
        request: Request<proto::ListActivitiesRequest>,
    ) -> Result<Response<proto::ActivityList>, Status> {
        let req = request.into_inner();
        let category_id = Self::parse_optional_uuid(req.category_id.as_deref(), "category_id")?;

        let activities = self
            .app_state
            .activity_service
            .list(category_id, req.featured, req.limit)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(activity_list(activities)))
    }

    async fn get_activity(
        &self,
        request: Request<proto::GetActivityRequest>,
    ) -> Result<Response<proto::ActivityLookup>, Status> {
        let req = request.into_inner();
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let detail = self
            .app_state
            .activity_service
            .get_detail(activity_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ActivityLookup {
            activity: detail.map(|d| proto::ActivityDetail {
                summary: Some(d.summary.into()),
                reviews: d.reviews.into_iter().map(Into::into).collect(),
            }),
        }))
    }

    async fn get_featured_activities(
        &self,
        request: Request<proto::FeaturedActivitiesRequest>,
    ) -> Result<Response<proto::ActivityList>, Status> {
        let activities = self
            .app_state
            .activity_service
            .featured(request.into_inner().limit)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(activity_list(activities)))
    }

    async fn get_activities_by_host(
        &self,
        request: Request<proto::ActivitiesByHostRequest>,
    ) -> Result<Response<proto::ActivityList>, Status> {
        let host_id = Self::parse_uuid(&request.into_inner().host_id, "host_id")?;
        let activities = self
            .app_state
            .activity_service
            .by_host(host_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(activity_list(activities)))
    }

    async fn search_activities(
        &self,
        request: Request<proto::SearchActivitiesRequest>,
    ) -> Result<Response<proto::ActivityList>, Status> {
        let req = request.into_inner();
        let activities = self
            .app_state
            .activity_service
            .search(&req.query, req.limit)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(activity_list(activities)))
    }

    async fn browse_activities(
        &self,
        request: Request<proto::BrowseActivitiesRequest>,
    ) -> Result<Response<proto::ActivityPage>, Status> {
        let req = request.into_inner();
        let filter = ActivityFilter {
            search: req.search,
            location: req.location,
            category_slug: req.category_slug,
            min_price: Self::parse_optional_decimal(req.min_price.as_deref(), "min_price")?,
            max_price: Self::parse_optional_decimal(req.max_price.as_deref(), "max_price")?,
            min_age: req.min_age,
            max_age: req.max_age,
            audience: req
                .audience
                .as_deref()
                .map(Audience::from_str)
                .transpose()
                .map_err(Status::invalid_argument)?,
            sort: req
                .sort
                .as_deref()
                .map(ActivitySort::from_str)
                .transpose()
                .map_err(Status::invalid_argument)?
                .unwrap_or_default(),
            page: req.page,
            per_page: req.per_page,
        };

        let page = self
            .app_state
            .activity_service
            .browse(&filter)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ActivityPage {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total as u64,
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
        }))
    }

    async fn create_activity(
        &self,
        request: Request<proto::CreateActivityRequest>,
    ) -> Result<Response<proto::ActivityResponse>, Status> {
        let req = request.into_inner();
        info!("CreateActivity request: title={}", req.title);
        let caller = self.caller(req.identity).await?;

        let input = NewActivity {
            title: req.title,
            description: req.description,
            location: req.location,
            address: req.address,
            latitude: req.latitude,
            longitude: req.longitude,
            price: Self::parse_decimal(&req.price, "price")?,
            duration_minutes: req.duration_minutes,
            min_age: req.min_age,
            max_age: req.max_age,
            capacity: req.capacity,
            category_id: Self::parse_uuid(&req.category_id, "category_id")?,
            images: req.images,
            host_id: Self::parse_uuid(&req.host_id, "host_id")?,
        };

        let activity = self
            .app_state
            .activity_service
            .create(&caller, input)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ActivityResponse {
            activity: Some(activity.into()),
        }))
    }

    async fn set_activity_active(
        &self,
        request: Request<proto::SetActivityActiveRequest>,
    ) -> Result<Response<proto::ActivityResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let activity = self
            .app_state
            .activity_service
            .set_active(&caller, activity_id, req.active)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ActivityResponse {
            activity: Some(activity.into()),
        }))
    }

    // ========================================================================
    // Availability
    // ========================================================================

    async fn list_availability(
        &self,
        request: Request<proto::ListAvailabilityRequest>,
    ) -> Result<Response<proto::AvailabilityList>, Status> {
        let req = request.into_inner();
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;
        let from_date = req
            .from_date
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(parse_booking_date)
            .transpose()
            .map_err(Status::invalid_argument)?;

        let slots = self
            .app_state
            .activity_service
            .list_availability(activity_id, from_date)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::AvailabilityList {
            slots: slots.into_iter().map(Into::into).collect(),
        }))
    }

    async fn create_availability_slot(
        &self,
        request: Request<proto::CreateSlotRequest>,
    ) -> Result<Response<proto::AvailabilitySlot>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let slot = NewSlot {
            date: parse_booking_date(&req.date).map_err(Status::invalid_argument)?,
            start_time: parse_slot_time(&req.start_time).map_err(Status::invalid_argument)?,
            end_time: parse_slot_time(&req.end_time).map_err(Status::invalid_argument)?,
            capacity: req.capacity,
        };

        let created = self
            .app_state
            .activity_service
            .create_slot(&caller, activity_id, slot)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(created.into()))
    }

    // ========================================================================
    // Bookings
    // ========================================================================

    async fn get_user_bookings(
        &self,
        request: Request<proto::UserBookingsRequest>,
    ) -> Result<Response<proto::UserBookingList>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let user_id = Self::parse_optional_uuid(req.user_id.as_deref(), "user_id")?;
        let scope = req
            .scope
            .as_deref()
            .map(BookingScope::from_str)
            .transpose()
            .map_err(Status::invalid_argument)?
            .unwrap_or_default();

        let bookings = self
            .app_state
            .booking_service
            .list_for_user(&caller, user_id, scope)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::UserBookingList {
            bookings: bookings.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_activity_bookings(
        &self,
        request: Request<proto::ActivityBookingsRequest>,
    ) -> Result<Response<proto::ActivityBookingList>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let result = self
            .app_state
            .booking_service
            .list_for_activity(&caller, activity_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ActivityBookingList {
            bookings: result.bookings.into_iter().map(Into::into).collect(),
            summary: Some(result.summary.into()),
        }))
    }

    async fn get_booking(
        &self,
        request: Request<proto::GetBookingRequest>,
    ) -> Result<Response<proto::BookingLookup>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let booking_id = Self::parse_uuid(&req.booking_id, "booking_id")?;

        let detail = self
            .app_state
            .booking_service
            .get(&caller, booking_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::BookingLookup {
            booking: detail.map(Into::into),
        }))
    }

    async fn create_booking(
        &self,
        request: Request<proto::CreateBookingRequest>,
    ) -> Result<Response<proto::BookingResponse>, Status> {
        let req = request.into_inner();
        info!(
            "CreateBooking request: activity={}, participants={}",
            req.activity_id, req.participants
        );
        let caller = self.caller(req.identity).await?;

        let parse_time = |raw: Option<&str>| {
            raw.filter(|s| !s.is_empty())
                .map(parse_slot_time)
                .transpose()
                .map_err(Status::invalid_argument)
        };

        let input = NewBooking {
            activity_id: Self::parse_uuid(&req.activity_id, "activity_id")?,
            date: parse_booking_date(&req.date).map_err(Status::invalid_argument)?,
            start_time: parse_time(req.start_time.as_deref())?,
            end_time: parse_time(req.end_time.as_deref())?,
            participants: req.participants,
            total_price: Self::parse_optional_decimal(req.total_price.as_deref(), "total_price")?,
            payment_intent_id: req.payment_intent_id.filter(|s| !s.is_empty()),
        };

        let booking = self
            .app_state
            .booking_service
            .create(&caller, input)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::BookingResponse {
            booking: Some(booking.into()),
        }))
    }

    async fn update_booking_status(
        &self,
        request: Request<proto::UpdateBookingStatusRequest>,
    ) -> Result<Response<proto::BookingResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let booking_id = Self::parse_uuid(&req.booking_id, "booking_id")?;
        let status = BookingStatus::from_str(&req.status).map_err(Status::invalid_argument)?;

        let booking = self
            .app_state
            .booking_service
            .update_status(&caller, booking_id, status)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::BookingResponse {
            booking: Some(booking.into()),
        }))
    }

    async fn cancel_booking(
        &self,
        request: Request<proto::CancelBookingRequest>,
    ) -> Result<Response<proto::BookingResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let booking_id = Self::parse_uuid(&req.booking_id, "booking_id")?;

        let booking = self
            .app_state
            .booking_service
            .cancel(&caller, booking_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::BookingResponse {
            booking: Some(booking.into()),
        }))
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    async fn get_favorites(
        &self,
        request: Request<proto::FavoritesRequest>,
    ) -> Result<Response<proto::FavoriteList>, Status> {
        let caller = self.caller(request.into_inner().identity).await?;
        let favorites = self
            .app_state
            .favorite_service
            .list(&caller)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::FavoriteList {
            favorites: favorites
                .into_iter()
                .map(|f| proto::FavoriteActivity {
                    favorite_id: f.favorite_id.to_string(),
                    activity: Some(f.summary.into()),
                })
                .collect(),
        }))
    }

    async fn is_favorited(
        &self,
        request: Request<proto::FavoriteRequest>,
    ) -> Result<Response<proto::IsFavoritedResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let favorited = self
            .app_state
            .favorite_service
            .is_favorited(&caller, activity_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::IsFavoritedResponse { favorited }))
    }

    async fn add_favorite(
        &self,
        request: Request<proto::FavoriteRequest>,
    ) -> Result<Response<proto::AddFavoriteResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let favorite = self
            .app_state
            .favorite_service
            .add(&caller, activity_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::AddFavoriteResponse {
            favorite_id: favorite.id.to_string(),
        }))
    }

    async fn remove_favorite(
        &self,
        request: Request<proto::FavoriteRequest>,
    ) -> Result<Response<proto::RemoveFavoriteResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let removed = self
            .app_state
            .favorite_service
            .remove(&caller, activity_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::RemoveFavoriteResponse { removed }))
    }

    async fn toggle_favorite(
        &self,
        request: Request<proto::FavoriteRequest>,
    ) -> Result<Response<proto::ToggleFavoriteResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let toggle = self
            .app_state
            .favorite_service
            .toggle(&caller, activity_id)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ToggleFavoriteResponse {
            action: toggle.action.as_str().to_string(),
            favorited: toggle.favorited,
        }))
    }

    // ========================================================================
    // Reviews
    // ========================================================================

    async fn create_review(
        &self,
        request: Request<proto::CreateReviewRequest>,
    ) -> Result<Response<proto::ReviewResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;
        let activity_id = Self::parse_uuid(&req.activity_id, "activity_id")?;

        let review = self
            .app_state
            .review_service
            .create(&caller, activity_id, req.rating, req.comment)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::ReviewResponse {
            id: review.id.to_string(),
            activity_id: review.activity_id.to_string(),
            rating: review.rating.into(),
            comment: review.comment,
            created_at: timestamp(review.created_at),
        }))
    }

    // ========================================================================
    // Payments
    // ========================================================================

    async fn create_payment_intent(
        &self,
        request: Request<proto::CreatePaymentIntentRequest>,
    ) -> Result<Response<proto::PaymentIntentResponse>, Status> {
        let req = request.into_inner();
        let caller = self.caller(req.identity).await?;

        let intent_request = PaymentIntentRequest {
            activity_id: Self::parse_optional_uuid(Some(&req.activity_id), "activity_id")?,
            date: Some(req.date).filter(|s| !s.is_empty()),
            participants: Some(req.participants),
            amount: Self::parse_optional_decimal(req.amount.as_deref(), "amount")?,
        };

        let intent = self
            .app_state
            .payment_service
            .create_payment_intent(&caller, intent_request)
            .await
            .map_err(Self::to_status)?;

        Ok(Response::new(proto::PaymentIntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.payment_intent_id,
            amount: intent.amount.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_to_status_mapping() {
        let cases = [
            (AppError::NotFound("x".into()), Code::NotFound),
            (AppError::Unauthorized("x".into()), Code::Unauthenticated),
            (AppError::Forbidden("x".into()), Code::PermissionDenied),
            (AppError::Validation("x".into()), Code::InvalidArgument),
            (AppError::Duplicate("x".into()), Code::AlreadyExists),
            (AppError::Conflict("Not enough availability".into()), Code::FailedPrecondition),
            (AppError::ExternalService("x".into()), Code::Unavailable),
            (AppError::Message("x".into()), Code::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(MarketplaceGrpcService::to_status(err).code(), code);
        }
    }

    #[test]
    fn test_parse_helpers() {
        assert!(MarketplaceGrpcService::parse_uuid("nope", "activity_id").is_err());
        assert_eq!(
            MarketplaceGrpcService::parse_optional_uuid(Some(""), "user_id").unwrap(),
            None
        );
        assert_eq!(
            MarketplaceGrpcService::parse_optional_decimal(Some("12.50"), "amount").unwrap(),
            Some(Decimal::new(1250, 2))
        );
    }

    fn sample_booking() -> models::Booking {
        let now = chrono::Utc::now().naive_utc();
        models::Booking {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            date: chrono::NaiveDate::from_ymd_opt(2030, 7, 4).unwrap(),
            start_time: models::booking::default_start_time(),
            end_time: models::booking::default_end_time(),
            participants: 3,
            total_price: Decimal::new(15000, 2),
            status: "PENDING".into(),
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_booking_conversion_formats_times() {
        let wire: proto::Booking = sample_booking().into();
        assert_eq!(wire.date, "2030-07-04");
        assert_eq!(wire.start_time, "09:00");
        assert_eq!(wire.end_time, "12:00");
        assert_eq!(wire.total_price, "150.00");
    }

    #[test]
    fn test_booking_rows_fall_back_to_unknown_names() {
        let row = models::BookingWithUser {
            booking: sample_booking(),
            user_name: None,
            user_email: None,
            user_image: None,
        };
        let wire: proto::ActivityBooking = row.into();
        assert_eq!(wire.user_name, "Unknown");
        assert_eq!(wire.user_email, "");

        let row = models::BookingWithActivity {
            booking: sample_booking(),
            activity_title: "Tide Pools".into(),
            activity_location: "Monterey".into(),
            activity_images: vec![],
            host_name: None,
            host_image: None,
        };
        let wire: proto::UserBooking = row.into();
        assert_eq!(wire.host_name, "Unknown Host");

        let row = models::BookingDetail {
            booking: sample_booking(),
            activity_title: "Tide Pools".into(),
            activity_location: "Monterey".into(),
            activity_description: "Explore the shore".into(),
            activity_images: vec![],
            activity_price: Decimal::new(4500, 2),
            host_id: Uuid::new_v4(),
            host_name: None,
            host_image: None,
            user_name: None,
            user_email: None,
        };
        let wire: proto::BookingDetail = row.into();
        assert_eq!(wire.host_name, "Unknown Host");
        assert_eq!(wire.user_name, "Unknown");
    }
}
