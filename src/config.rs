//! Engine configuration module
//! Handles environment variable loading, configuration validation and engine settings

use crate::payments::types::PaymentMethod;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub polling: PollingConfig,
    /// Freshness window applied by `query_payment_status` to cached results
    pub status_cache_ttl: Duration,
    /// Medium-risk payments above this amount need a verified payment password
    pub password_amount_threshold: Decimal,
    /// Method used when a request does not name one
    pub default_payment_method: PaymentMethod,
    pub lock_policy: LockPolicy,
    /// Consecutive wrong passwords before the payment lock is set
    pub max_password_attempts: u32,
    pub logging: LoggingConfig,
}

/// Status polling configuration, fixed for the lifetime of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_retries: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// What happens to an active payment lock when a later assessment comes back LOW.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// The lock stays until `reset_security_state` is called.
    Sticky,
    /// A LOW assessment in a secure environment lifts the lock.
    ClearOnLowRisk,
}

impl FromStr for LockPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "sticky" => Ok(LockPolicy::Sticky),
            "clear_on_low_risk" => Ok(LockPolicy::ClearOnLowRisk),
            _ => Err(format!(
                "unsupported policy '{}', expected sticky or clear_on_low_risk",
                value
            )),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "plain" | "text" => Ok(LogFormat::Plain),
            _ => Err(format!("unsupported format '{}', expected json or plain", value)),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_retries: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            status_cache_ttl: Duration::from_millis(5000),
            password_amount_threshold: Decimal::from(1000),
            default_payment_method: PaymentMethod::WechatPay,
            lock_policy: LockPolicy::Sticky,
            max_password_attempts: 3,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let defaults = Self::default();

        Ok(EngineConfig {
            polling: PollingConfig::from_env()?,
            status_cache_ttl: Duration::from_millis(parse_var(
                "PAYMENT_STATUS_CACHE_TTL_MS",
                defaults.status_cache_ttl.as_millis() as u64,
            )?),
            password_amount_threshold: parse_var(
                "PAYMENT_PASSWORD_THRESHOLD",
                defaults.password_amount_threshold,
            )?,
            default_payment_method: env::var("PAYMENT_DEFAULT_METHOD")
                .map(|v| PaymentMethod::from(v.as_str()))
                .unwrap_or(defaults.default_payment_method),
            lock_policy: parse_var("PAYMENT_LOCK_POLICY", defaults.lock_policy)?,
            max_password_attempts: parse_var(
                "PAYMENT_MAX_PASSWORD_ATTEMPTS",
                defaults.max_password_attempts,
            )?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.polling.validate()?;

        if self.status_cache_ttl.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "PAYMENT_STATUS_CACHE_TTL_MS cannot be 0".to_string(),
            ));
        }

        if self.password_amount_threshold.is_sign_negative() {
            return Err(ConfigError::ValidationFailed(
                "PAYMENT_PASSWORD_THRESHOLD cannot be negative".to_string(),
            ));
        }

        if self.max_password_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "PAYMENT_MAX_PASSWORD_ATTEMPTS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl PollingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(PollingConfig {
            interval: Duration::from_millis(parse_var(
                "PAYMENT_POLL_INTERVAL_MS",
                defaults.interval.as_millis() as u64,
            )?),
            max_retries: parse_var("PAYMENT_POLL_MAX_RETRIES", defaults.max_retries)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "PAYMENT_POLL_INTERVAL_MS cannot be 0".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "PAYMENT_POLL_MAX_RETRIES cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Upper bound on how long a poll session can wait before reporting a timeout.
    pub fn total_budget(&self) -> Duration {
        self.interval
            .checked_mul(self.max_retries.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: parse_var("LOG_FORMAT", LogFormat::Plain)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
