use super::PaymentClientError;
use crate::config::PaymentConfig;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Header the gateway puts the webhook signature in
pub const SIGNATURE_HEADER: &str = "stripe-signature";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Payment intent as returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

impl WebhookEvent {
    /// Id of the payment intent the event is about, if any
    pub fn payment_intent_id(&self) -> Option<&str> {
        let object = &self.data.object;
        if object.get("object").and_then(|o| o.as_str()) == Some("payment_intent") {
            object.get("id").and_then(|id| id.as_str())
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Convert a decimal amount to the smallest currency unit
pub fn amount_to_cents(amount: Decimal) -> Result<i64, PaymentClientError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .filter(|cents| *cents >= 0)
        .ok_or_else(|| PaymentClientError::InvalidAmount(format!("Invalid amount: {}", amount)))
}

/// Verify a `t=<ts>,v1=<sig>[,v1=<sig>...]` signature header against the raw body
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), PaymentClientError> {
    let invalid = || PaymentClientError::InvalidSignature("Invalid signature".to_string());

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(invalid)?;
    if signatures.is_empty() {
        return Err(invalid());
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentClientError::InvalidSignature(
            "Signature timestamp outside tolerance".to_string(),
        ));
    }

    for signature in &signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| invalid())?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(invalid())
}

/// Client for the payment gateway REST API
pub struct StripeClient {
    config: PaymentConfig,
    http: reqwest::Client,
}

impl StripeClient {
    pub fn with_config(config: PaymentConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Create a payment intent with automatic payment methods enabled
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, PaymentClientError> {
        let secret_key = self
            .config
            .secret_key
            .as_deref()
            .ok_or(PaymentClientError::NotConfigured)?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), self.config.currency.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        debug!("Creating payment intent for {} {}", amount_cents, self.config.currency);

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.config.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(PaymentClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent = response
            .json::<PaymentIntent>()
            .await
            .map_err(|e| PaymentClientError::InvalidResponse(e.to_string()))?;

        info!("✅ Payment intent created: {}", intent.id);
        Ok(intent)
    }

    /// Verify the signature header and parse the event
    pub fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentClientError> {
        self.construct_event_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    pub fn construct_event_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, PaymentClientError> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or(PaymentClientError::NotConfigured)?;

        verify_webhook_signature(
            payload,
            signature_header,
            secret,
            self.config.webhook_tolerance_secs,
            now,
        )?;

        serde_json::from_slice::<WebhookEvent>(payload)
            .map_err(|e| PaymentClientError::MalformedEvent(format!("Malformed event: {}", e)))
    }
}

/// Build a signature header the way the gateway does; used by tests and local tooling
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}
