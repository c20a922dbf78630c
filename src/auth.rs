use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Identity assertion forwarded by the identity provider with each request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider subject; stored as `users.external_id`
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture_url: Option<String>,
    /// Unix timestamp the assertion was signed at
    pub timestamp: i64,
    /// Hex HMAC-SHA256 over [`Identity::auth_message`]
    pub signature: String,
}

impl Identity {
    /// Message the identity provider signs. Covers the profile fields as well,
    /// since they overwrite the stored user on every visit.
    pub fn auth_message(&self) -> String {
        let profile = serde_json::json!([self.email, self.name, self.picture_url]);
        format!(
            "{}:{}",
            create_auth_message(&self.subject, self.timestamp),
            profile
        )
    }

    /// Fill in the signature under `secret`
    pub fn signed(mut self, secret: &str) -> AppResult<Self> {
        self.signature = sign_message(secret, &self.auth_message())?;
        Ok(self)
    }
}

/// Subject and timestamp prefix of the signed message
///
/// # Arguments
/// * `subject` - The provider subject
/// * `timestamp` - Unix timestamp
pub fn create_auth_message(subject: &str, timestamp: i64) -> String {
    format!("movinature_auth:{}:{}", subject, timestamp)
}

/// Hex HMAC-SHA256 of `message` under `secret`
pub fn sign_message(secret: &str, message: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Config(format!("Invalid identity secret: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies identity assertions against the shared secret
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    secret: Option<String>,
    max_clock_skew_secs: i64,
    allow_unsigned: bool,
}

impl IdentityVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.identity_secret.clone(),
            max_clock_skew_secs: config.max_clock_skew_secs,
            allow_unsigned: config.allow_unsigned,
        }
    }

    /// Verify authentication with timestamp
    ///
    /// Checks that:
    /// 1. The subject is present
    /// 2. Timestamp is recent (within the configured skew)
    /// 3. Signature matches
    pub fn verify(&self, identity: &Identity) -> AppResult<()> {
        self.verify_at(identity, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, identity: &Identity, now: i64) -> AppResult<()> {
        if identity.subject.trim().is_empty() {
            return Err(AppError::Unauthorized("Not authenticated".to_string()));
        }
        if identity.signature.is_empty() {
            return Err(AppError::Unauthorized("Signature required".to_string()));
        }

        let time_diff = (now - identity.timestamp).abs();
        if time_diff > self.max_clock_skew_secs {
            return Err(AppError::Unauthorized(
                "Signature timestamp expired".to_string(),
            ));
        }

        let secret = match &self.secret {
            Some(secret) => secret,
            // Development without a secret: any non-empty signature passes
            None if self.allow_unsigned => return Ok(()),
            None => {
                return Err(AppError::Config(
                    "IDENTITY_SECRET is not configured".to_string(),
                ))
            }
        };

        let signature = hex::decode(&identity.signature)
            .map_err(|_| AppError::Unauthorized("Invalid signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid identity secret: {}", e)))?;
        mac.update(identity.auth_message().as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::Unauthorized("Invalid signature".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-identity-secret";

    fn verifier(secret: Option<&str>, allow_unsigned: bool) -> IdentityVerifier {
        IdentityVerifier::new(&AuthConfig {
            identity_secret: secret.map(str::to_string),
            max_clock_skew_secs: 300,
            allow_unsigned,
        })
    }

    fn signed(timestamp: i64, secret: &str) -> Identity {
        identity(timestamp, String::new()).signed(secret).unwrap()
    }

    fn identity(timestamp: i64, signature: String) -> Identity {
        Identity {
            subject: "user_2abc".to_string(),
            email: Some("parent@example.com".to_string()),
            name: Some("Pat".to_string()),
            picture_url: None,
            timestamp,
            signature,
        }
    }

    #[test]
    fn test_create_auth_message() {
        let message = create_auth_message("user_2abc", 1234567890);
        assert_eq!(message, "movinature_auth:user_2abc:1234567890");
    }

    #[test]
    fn test_auth_message_covers_profile() {
        let message = identity(1234567890, String::new()).auth_message();
        assert_eq!(
            message,
            r#"movinature_auth:user_2abc:1234567890:["parent@example.com","Pat",null]"#
        );
    }

    #[test]
    fn test_valid_signature_accepted() {
        let now = 1_700_000_000;
        assert!(verifier(Some(SECRET), false).verify_at(&signed(now, SECRET), now + 10).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = 1_700_000_000;
        let err = verifier(Some(SECRET), false)
            .verify_at(&signed(now, "other"), now)
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_altered_profile_rejected() {
        let now = 1_700_000_000;
        let verifier = verifier(Some(SECRET), false);

        let mut swapped = signed(now, SECRET);
        swapped.email = Some("attacker@evil.test".to_string());
        assert_eq!(verifier.verify_at(&swapped, now).unwrap_err().status_code(), 401);

        let mut renamed = signed(now, SECRET);
        renamed.name = None;
        assert!(verifier.verify_at(&renamed, now).is_err());

        let mut pictured = signed(now, SECRET);
        pictured.picture_url = Some("https://img.example.com/x.png".to_string());
        assert!(verifier.verify_at(&pictured, now).is_err());
    }

    #[test]
    fn test_verify_auth_with_timestamp_expired() {
        let now = 1_700_000_000;
        let old_timestamp = now - 400; // 400 seconds ago
        assert!(verifier(Some(SECRET), false)
            .verify_at(&signed(old_timestamp, SECRET), now)
            .is_err());
    }

    #[test]
    fn test_dev_mode_accepts_any_signature() {
        let now = 1_700_000_000;
        let dev = verifier(None, true);
        assert!(dev.verify_at(&identity(now, "anything".into()), now).is_ok());
        assert!(dev.verify_at(&identity(now, String::new()), now).is_err());

        // No secret outside development is a configuration error
        let err = verifier(None, false)
            .verify_at(&identity(now, "anything".into()), now)
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
