use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures raised by the payment API transport.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Request rejected: {message}")]
    Rejected {
        message: String,
        code: Option<String>,
    },

    #[error("Malformed response: {message}")]
    Decode { message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network { .. } => true,
            GatewayError::Timeout { .. } => true,
            GatewayError::Rejected { .. } => false,
            GatewayError::Decode { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Network { .. } | GatewayError::Timeout { .. } => {
                "Payment service is temporarily unavailable".to_string()
            }
            GatewayError::Rejected { message, .. } => message.clone(),
            GatewayError::Decode { .. } => {
                "Payment service returned an invalid response".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode {
            message: err.to_string(),
        }
    }
}
