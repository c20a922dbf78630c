use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Identity provider settings used to verify signed identity assertions
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared secret the identity provider signs assertions with
    pub identity_secret: Option<String>,
    /// Maximum age of a signed assertion, in seconds
    pub max_clock_skew_secs: i64,
    /// Accept unsigned assertions (development only)
    pub allow_unsigned: bool,
}

/// Payment gateway settings
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub currency: String,
    /// Flat fee added to every booking total
    pub service_fee: Decimal,
    /// Tolerance for webhook signature timestamps, in seconds
    pub webhook_tolerance_secs: i64,
}

/// Transactional email provider settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub from_email: String,
    pub api_base: String,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub email: EmailConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    pub grpc_port: u16,
    pub http_port: u16,
    pub ws_port: Option<u16>,
    pub audit_log_dir: String,
    pub environment: String,
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = parse_env::<u32>("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = parse_env::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = parse_env::<u64>("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = parse_env::<u64>("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = parse_env::<bool>("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);

        let config = Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate pool limits
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/movinature".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl AuthConfig {
    fn from_env(environment: &str) -> Self {
        let identity_secret = non_empty_env("IDENTITY_SECRET");
        let allow_unsigned = environment == "development" && identity_secret.is_none();

        Self {
            identity_secret,
            max_clock_skew_secs: parse_env::<i64>("IDENTITY_MAX_CLOCK_SKEW_SECS").unwrap_or(300),
            allow_unsigned,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_secret: None,
            max_clock_skew_secs: 300,
            allow_unsigned: true,
        }
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, String> {
        let service_fee = match env::var("BOOKING_SERVICE_FEE") {
            Ok(raw) => Decimal::from_str(raw.trim())
                .map_err(|e| format!("Invalid BOOKING_SERVICE_FEE: {}", e))?,
            Err(_) => Decimal::ZERO,
        };

        if service_fee < Decimal::ZERO {
            return Err("BOOKING_SERVICE_FEE must not be negative".to_string());
        }

        let currency = env::var("PAYMENT_CURRENCY")
            .unwrap_or_else(|_| "usd".to_string())
            .to_lowercase();

        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("Invalid PAYMENT_CURRENCY: {}", currency));
        }

        Ok(Self {
            secret_key: non_empty_env("STRIPE_SECRET_KEY"),
            webhook_secret: non_empty_env("STRIPE_WEBHOOK_SECRET"),
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            currency,
            service_fee,
            webhook_tolerance_secs: parse_env::<i64>("STRIPE_WEBHOOK_TOLERANCE_SECS").unwrap_or(300),
        })
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: "https://api.stripe.com".to_string(),
            currency: "usd".to_string(),
            service_fee: Decimal::ZERO,
            webhook_tolerance_secs: 300,
        }
    }
}

impl EmailConfig {
    fn from_env() -> Self {
        Self {
            api_key: non_empty_env("RESEND_API_KEY"),
            from_email: env::var("RESEND_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@movinature.com".to_string()),
            api_base: env::var("RESEND_API_BASE")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_email: "noreply@movinature.com".to_string(),
            api_base: "https://api.resend.com".to_string(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid LOG_FORMAT: {}. Must be one of: pretty, json", other)),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) => raw.parse::<LogFormat>()?,
            Err(_) => LogFormat::Pretty,
        };

        let grpc_port = parse_env::<u16>("GRPC_PORT").unwrap_or(50051);
        let http_port = parse_env::<u16>("HTTP_PORT").unwrap_or(3001);
        let ws_port = parse_env::<u16>("WS_PORT");

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();

        let audit_log_dir = env::var("AUDIT_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());

        let config = Self {
            database,
            auth: AuthConfig::from_env(&environment),
            payment: PaymentConfig::from_env()?,
            email: EmailConfig::from_env(),
            log_level: log_level.to_lowercase(),
            log_format,
            grpc_port,
            http_port,
            ws_port,
            audit_log_dir,
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field settings
    pub fn validate(&self) -> Result<(), String> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                self.log_level, valid_log_levels
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                self.environment, valid_environments
            ));
        }

        let mut ports = vec![self.grpc_port, self.http_port];
        if let Some(ws_port) = self.ws_port {
            ports.push(ws_port);
        }
        ports.sort_unstable();
        ports.dedup();
        if ports.len() != if self.ws_port.is_some() { 3 } else { 2 } {
            return Err("GRPC_PORT, HTTP_PORT and WS_PORT must be distinct".to_string());
        }

        if self.is_production() {
            if self.auth.identity_secret.is_none() {
                return Err("IDENTITY_SECRET is required in production".to_string());
            }
            if self.payment.webhook_secret.is_none() {
                return Err("STRIPE_WEBHOOK_SECRET is required in production".to_string());
            }
        }

        self.database.validate()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            payment: PaymentConfig::default(),
            email: EmailConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            grpc_port: 50051,
            http_port: 3001,
            ws_port: None,
            audit_log_dir: "./logs".to_string(),
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
        assert_eq!(config.idle_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_database_config_rejects_zero_connections() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.grpc_port, 50051);
        assert_eq!(config.http_port, 3001);
        assert!(config.is_development());
        assert!(!config.is_production());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secrets() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            environment: "production".to_string(),
            auth: AuthConfig {
                identity_secret: Some("id-secret".to_string()),
                allow_unsigned: false,
                ..AuthConfig::default()
            },
            payment: PaymentConfig {
                webhook_secret: Some("whsec_test".to_string()),
                ..PaymentConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ports_must_be_distinct() {
        let config = AppConfig {
            http_port: 50051,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            ws_port: Some(3001),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
