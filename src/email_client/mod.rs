//! Transactional email through the provider's HTTP API

pub mod booking_confirmation;
pub mod resend_client;

pub use booking_confirmation::BookingConfirmation;
pub use resend_client::{EmailMessage, ResendClient};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmailClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider returned {status}: {message}")]
    Api { status: u16, message: String },
}
