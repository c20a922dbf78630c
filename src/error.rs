use crate::database::DatabaseError;
use crate::email_client::EmailClientError;
use crate::payment_client::PaymentClientError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Errors surfaced by services and mapped onto HTTP and gRPC responses
#[derive(Error, Debug)]
pub enum AppError {
    /// Pool creation, timeouts and migrations
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Missing or inconsistent settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input: bad ids, dates, ranges, missing fields
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or invalid identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A record that may exist only once already does
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Illegal status transitions, exhausted availability
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment gateway or email provider failure
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// HTTP status for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Duplicate(_) | AppError::Conflict(_) => 409,
            AppError::ExternalService(_) => 502,
            _ => 500,
        }
    }

    /// Message safe to show to clients; internal failures are masked
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::Duplicate(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::ExternalService(_) => "Upstream service unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Errors raised by the repositories
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Query error: {0}")]
    Query(SqlxError),

    #[error("Record not found")]
    NotFound(String),

    /// Unique constraint hit (second review, duplicate slot)
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Foreign key or CHECK constraint hit
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Seat reservation could not be satisfied
    #[error("Business rule violation: {0}")]
    BusinessRule(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Duplicate(msg),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::BusinessRule(msg) => AppError::Conflict(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

impl From<PaymentClientError> for AppError {
    fn from(err: PaymentClientError) -> Self {
        match err {
            PaymentClientError::NotConfigured => {
                AppError::Config("Payment gateway is not configured".to_string())
            }
            PaymentClientError::InvalidSignature(msg)
            | PaymentClientError::MalformedEvent(msg)
            | PaymentClientError::InvalidAmount(msg) => AppError::Validation(msg),
            other => AppError::ExternalService(other.to_string()),
        }
    }
}

impl From<EmailClientError> for AppError {
    fn from(err: EmailClientError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Validation("bad".into()).status_code(), 400);
        assert_eq!(AppError::Unauthorized("who".into()).status_code(), 401);
        assert_eq!(AppError::Forbidden("no".into()).status_code(), 403);
        assert_eq!(AppError::NotFound("gone".into()).status_code(), 404);
        assert_eq!(AppError::Conflict("dup".into()).status_code(), 409);
        assert_eq!(AppError::ExternalService("down".into()).status_code(), 502);
        assert_eq!(AppError::Message("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = AppError::Message("connection string leaked".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Validation("participants must be at least 1".into());
        assert_eq!(err.public_message(), "participants must be at least 1");
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: AppError = RepositoryError::Duplicate("reviews_user_id_activity_id_key".into()).into();
        assert_eq!(err.status_code(), 409);

        let err: AppError = RepositoryError::NotFound("Booking".into()).into();
        assert!(err.is_not_found());

        let err: AppError = RepositoryError::BusinessRule("Not enough availability".into()).into();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_payment_errors_map_to_bad_request() {
        let err: AppError = PaymentClientError::InvalidSignature("Invalid signature".into()).into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Invalid signature");
    }
}
