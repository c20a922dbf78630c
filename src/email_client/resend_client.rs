use super::EmailClientError;
use crate::config::EmailConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outgoing email
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Client for the transactional email provider
pub struct ResendClient {
    config: EmailConfig,
    http: reqwest::Client,
}

impl ResendClient {
    pub fn with_config(config: EmailConfig) -> Self {
        if config.api_key.is_none() {
            warn!("RESEND_API_KEY is not set - emails will not be sent");
        }
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub fn from_email(&self) -> &str {
        &self.config.from_email
    }

    /// Send an email. Returns the provider message id, or None when sending is disabled.
    pub async fn send(&self, message: &EmailMessage) -> Result<Option<String>, EmailClientError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            warn!("Skipping email '{}': no API key configured", message.subject);
            return Ok(None);
        };

        let response = self
            .http
            .post(format!("{}/emails", self.config.api_base))
            .bearer_auth(api_key)
            .json(message)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent = response.json::<SendResponse>().await?;
        info!("📧 Email sent: {}", sent.id);
        Ok(Some(sent.id))
    }
}
