//! Payment gateway integration
//!
//! Creates payment intents over the gateway's REST API and verifies the
//! signatures on incoming webhooks.

pub mod stripe_client;

pub use stripe_client::{
    amount_to_cents, sign_webhook_payload, verify_webhook_signature, PaymentIntent, StripeClient,
    WebhookEvent, SIGNATURE_HEADER,
};

use thiserror::Error;

/// Payment gateway errors
#[derive(Error, Debug)]
pub enum PaymentClientError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("{0}")]
    InvalidSignature(String),

    #[error("{0}")]
    MalformedEvent(String),

    #[error("{0}")]
    InvalidAmount(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}
