//! Identity assertion carried in `x-identity-*` request headers

use crate::auth::Identity;
use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

pub const HEADER_SUBJECT: &str = "x-identity-subject";
pub const HEADER_TIMESTAMP: &str = "x-identity-timestamp";
pub const HEADER_SIGNATURE: &str = "x-identity-signature";
pub const HEADER_EMAIL: &str = "x-identity-email";
pub const HEADER_NAME: &str = "x-identity-name";
pub const HEADER_IMAGE: &str = "x-identity-image";

/// The request's identity, if it carried one. Verification happens in the user service.
#[derive(Debug, Clone, Default)]
pub struct MaybeIdentity(pub Option<Identity>);

impl MaybeIdentity {
    pub fn as_ref(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Read an identity out of request headers; no subject means anonymous
pub fn identity_from_headers(headers: &HeaderMap) -> Result<Option<Identity>, AppError> {
    let Some(subject) = header(headers, HEADER_SUBJECT) else {
        return Ok(None);
    };

    let timestamp = header(headers, HEADER_TIMESTAMP)
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid identity timestamp".to_string()))?;

    Ok(Some(Identity {
        subject,
        email: header(headers, HEADER_EMAIL),
        name: header(headers, HEADER_NAME),
        picture_url: header(headers, HEADER_IMAGE),
        timestamp,
        signature: header(headers, HEADER_SIGNATURE).unwrap_or_default(),
    }))
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers).map(MaybeIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_anonymous_without_subject() {
        let headers = HeaderMap::new();
        assert!(identity_from_headers(&headers).unwrap().is_none());
    }

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_SUBJECT, HeaderValue::from_static("idp|42"));
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_static("1700000000"));
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_static("abcd"));
        headers.insert(HEADER_EMAIL, HeaderValue::from_static("parent@example.com"));

        let identity = identity_from_headers(&headers).unwrap().unwrap();
        assert_eq!(identity.subject, "idp|42");
        assert_eq!(identity.timestamp, 1_700_000_000);
        assert_eq!(identity.email.as_deref(), Some("parent@example.com"));
        assert!(identity.name.is_none());
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_SUBJECT, HeaderValue::from_static("idp|42"));
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_static("yesterday"));

        let err = identity_from_headers(&headers).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
