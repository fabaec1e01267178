use crate::payments::types::PaymentRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub type AdvisorResult<T> = Result<T, AdvisorError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdvisorError {
    #[error("environment check failed: {0}")]
    Environment(String),

    #[error("risk assessment failed: {0}")]
    Assessment(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("signature generation failed: {0}")]
    Signature(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Verdict produced by an advisor for one payment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    #[serde(default)]
    pub advice: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client fingerprint collected for later server-side verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureParams {
    pub order_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Environment checks, risk scoring and payload protection.
///
/// Every call is synchronous and may fail; the risk gate decides how each
/// failure degrades.
pub trait SecurityAdvisor: Send + Sync {
    /// `false` for rooted devices, intercepting proxies and similar setups.
    fn check_environment(&self) -> AdvisorResult<bool>;

    fn collect_device_info(&self) -> AdvisorResult<DeviceInfo>;

    fn encrypt_device_info(&self, info: &DeviceInfo) -> AdvisorResult<String>;

    fn perform_risk_assessment(&self, request: &PaymentRequest) -> AdvisorResult<RiskAssessment>;

    fn encrypt_password(&self, password: &str) -> AdvisorResult<String>;

    fn generate_signature(&self, params: &SignatureParams) -> AdvisorResult<String>;

    /// Returns the payload to dispatch. Advisors may rewrite any field,
    /// including `payment_method`.
    fn secure_payment_data(&self, request: PaymentRequest) -> AdvisorResult<PaymentRequest>;
}
