//! Error handling for the payment engine
//!
//! Gate rejections (lock, risk, password) are blocking and never retried by
//! the engine. Gateway failures are recorded in the payment status and handed
//! back to the caller unchanged.

use crate::payments::error::GatewayError;
use crate::security::advisor::AdvisorError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PASSWORD_REQUIRED_MESSAGE: &str = "payment password required for high-value payments";

/// Stable codes for programmatic handling by UI layers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PaymentLocked,
    RiskRejected,
    PasswordRequired,
    InvalidPassword,
    BalancePaymentDeclined,
    PaymentServiceError,
    SecurityAdvisorError,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PaymentEngineError {
    #[error("{reason}")]
    PaymentLocked { reason: String },

    #[error("{reason}")]
    RiskRejected { reason: String },

    #[error("{}", PASSWORD_REQUIRED_MESSAGE)]
    PasswordRequired,

    #[error("invalid payment password: {reason}")]
    InvalidPassword { reason: String },

    #[error("{message}")]
    BalancePaymentDeclined { message: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Advisor(#[from] AdvisorError),
}

impl PaymentEngineError {
    /// Lock, risk and password rejections.
    pub fn is_gate_rejection(&self) -> bool {
        matches!(
            self,
            PaymentEngineError::PaymentLocked { .. }
                | PaymentEngineError::RiskRejected { .. }
                | PaymentEngineError::PasswordRequired
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentEngineError::Gateway(err) => err.is_retryable(),
            _ => false,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            PaymentEngineError::PaymentLocked { .. } => ErrorCode::PaymentLocked,
            PaymentEngineError::RiskRejected { .. } => ErrorCode::RiskRejected,
            PaymentEngineError::PasswordRequired => ErrorCode::PasswordRequired,
            PaymentEngineError::InvalidPassword { .. } => ErrorCode::InvalidPassword,
            PaymentEngineError::BalancePaymentDeclined { .. } => ErrorCode::BalancePaymentDeclined,
            PaymentEngineError::Gateway(_) => ErrorCode::PaymentServiceError,
            PaymentEngineError::Advisor(_) => ErrorCode::SecurityAdvisorError,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentEngineError::Gateway(err) => err.user_message(),
            PaymentEngineError::Advisor(_) => {
                "Payment security check failed, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, PaymentEngineError>;
