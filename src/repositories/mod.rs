pub mod activity_repository;
pub mod availability_repository;
pub mod booking_repository;
pub mod category_repository;
pub mod favorite_repository;
pub mod payment_event_repository;
pub mod review_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use activity_repository::ActivityRepository;
pub use availability_repository::AvailabilityRepository;
pub use booking_repository::BookingRepository;
pub use category_repository::CategoryRepository;
pub use favorite_repository::FavoriteRepository;
pub use payment_event_repository::PaymentEventRepository;
pub use review_repository::ReviewRepository;
pub use user_repository::UserRepository;
