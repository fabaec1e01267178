//! Rule-based security advisor
//!
//! A self-contained [`SecurityAdvisor`] for hosts that have no dedicated risk
//! service. Scoring rules:
//! - amount above 10 000 is HIGH, above 5 000 is MEDIUM
//! - three or more attempts inside a ten minute window is MEDIUM
//!
//! Signatures are uppercase hex HMAC-SHA256 over the sorted `key=value&`
//! parameter string followed by `key=<secret>`.

use crate::payments::types::{PaymentRequest, SecurityEnvelope};
use crate::security::advisor::{
    AdvisorError, AdvisorResult, DeviceInfo, RiskAssessment, RiskLevel, SecurityAdvisor,
    SignatureParams,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, OnceLock};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const HIGH_RISK_AMOUNT: i64 = 10_000;
const MEDIUM_RISK_AMOUNT: i64 = 5_000;
const FREQUENT_ATTEMPTS: usize = 3;
const ATTEMPT_WINDOW_MINUTES: i64 = 10;

const TRIVIAL_PASSWORDS: &[&str] = &[
    "123456", "000000", "111111", "123123", "654321", "123321", "112233",
];

/// What the host knows about where the payment page is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentProbe {
    pub secure_transport: bool,
    pub embedded_in_frame: bool,
    pub storage_available: bool,
}

impl Default for EnvironmentProbe {
    fn default() -> Self {
        Self {
            secure_transport: true,
            embedded_in_frame: false,
            storage_available: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueSeverity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentIssue {
    pub kind: &'static str,
    pub severity: IssueSeverity,
    pub message: &'static str,
}

impl EnvironmentProbe {
    /// Medium issues are reported but do not make the environment insecure.
    pub fn issues(&self) -> Vec<EnvironmentIssue> {
        let mut issues = Vec::new();
        if !self.secure_transport {
            issues.push(EnvironmentIssue {
                kind: "insecure_protocol",
                severity: IssueSeverity::Critical,
                message: "connection is not encrypted",
            });
        }
        if self.embedded_in_frame {
            issues.push(EnvironmentIssue {
                kind: "iframe_environment",
                severity: IssueSeverity::High,
                message: "payment page is embedded in a frame",
            });
        }
        if !self.storage_available {
            issues.push(EnvironmentIssue {
                kind: "local_storage_disabled",
                severity: IssueSeverity::Medium,
                message: "local storage is disabled",
            });
        }
        issues
    }
}

/// Format check for a six digit payment password.
pub fn validate_password_format(password: &str) -> Result<(), String> {
    static SIX_DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = SIX_DIGITS.get_or_init(|| Regex::new(r"^\d{6}$").expect("static regex is valid"));

    if password.is_empty() {
        return Err("payment password is required".to_string());
    }
    if !re.is_match(password) {
        return Err("payment password must be exactly 6 digits".to_string());
    }
    if TRIVIAL_PASSWORDS.contains(&password) {
        return Err("payment password is too simple".to_string());
    }
    Ok(())
}

pub struct RuleBasedAdvisor {
    secret: String,
    salt: String,
    environment: EnvironmentProbe,
    device: DeviceInfo,
    attempts: Mutex<VecDeque<DateTime<Utc>>>,
}

impl RuleBasedAdvisor {
    /// `secret` keys signatures; `salt` (usually the user id) salts password digests.
    pub fn new(secret: impl Into<String>, salt: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            salt: salt.into(),
            environment: EnvironmentProbe::default(),
            device: DeviceInfo {
                platform: std::env::consts::OS.to_string(),
                user_agent: None,
                attributes: BTreeMap::new(),
            },
            attempts: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_environment(mut self, environment: EnvironmentProbe) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    fn mac(&self, message: &[u8]) -> AdvisorResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AdvisorError::Signature(e.to_string()))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn sign_params(&self, params: &BTreeMap<&str, String>) -> AdvisorResult<String> {
        let mut sign_str = String::new();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            sign_str.push_str(&format!("{}={}&", key, value));
        }
        sign_str.push_str(&format!("key={}", self.secret));
        Ok(hex::encode_upper(self.mac(sign_str.as_bytes())?))
    }

    /// Records this attempt and returns how many earlier attempts are still
    /// inside the window.
    fn record_attempt(&self, now: DateTime<Utc>) -> AdvisorResult<usize> {
        let mut attempts = self
            .attempts
            .lock()
            .map_err(|_| AdvisorError::Assessment("attempt log poisoned".to_string()))?;
        let window_start = now - Duration::minutes(ATTEMPT_WINDOW_MINUTES);
        attempts.retain(|at| *at > window_start);
        let previous = attempts.len();
        attempts.push_back(now);
        Ok(previous)
    }

    fn assess(&self, amount: Decimal, recent_attempts: usize) -> RiskAssessment {
        let mut level = RiskLevel::Low;
        let mut advice = Vec::new();
        let mut message = None;

        if amount > Decimal::from(HIGH_RISK_AMOUNT) {
            level = RiskLevel::High;
            message = Some("single transaction amount is too high".to_string());
            advice.push("split the payment or contact support".to_string());
        } else if amount > Decimal::from(MEDIUM_RISK_AMOUNT) {
            level = level.max(RiskLevel::Medium);
            advice.push("large amount, please confirm before paying".to_string());
        }

        if recent_attempts >= FREQUENT_ATTEMPTS {
            level = level.max(RiskLevel::Medium);
            advice.push("too many payment attempts in a short time".to_string());
        }

        RiskAssessment {
            level,
            advice,
            message,
        }
    }
}

impl SecurityAdvisor for RuleBasedAdvisor {
    fn check_environment(&self) -> AdvisorResult<bool> {
        Ok(self
            .environment
            .issues()
            .iter()
            .all(|issue| issue.severity < IssueSeverity::High))
    }

    fn collect_device_info(&self) -> AdvisorResult<DeviceInfo> {
        Ok(self.device.clone())
    }

    /// Produces `base64(json).hex(hmac)`. The token is tamper evident, not
    /// confidential.
    fn encrypt_device_info(&self, info: &DeviceInfo) -> AdvisorResult<String> {
        let body = serde_json::to_vec(info).map_err(|e| AdvisorError::Encryption(e.to_string()))?;
        let tag = self.mac(&body)?;
        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(&body), hex::encode(tag)))
    }

    fn perform_risk_assessment(&self, request: &PaymentRequest) -> AdvisorResult<RiskAssessment> {
        let recent = self.record_attempt(Utc::now())?;
        Ok(self.assess(request.amount, recent))
    }

    /// Salted SHA-256 applied twice.
    fn encrypt_password(&self, password: &str) -> AdvisorResult<String> {
        let first = hex::encode(Sha256::digest(format!("{}{}", password, self.salt)));
        Ok(hex::encode(Sha256::digest(format!("{}{}", first, self.salt))))
    }

    fn generate_signature(&self, params: &SignatureParams) -> AdvisorResult<String> {
        let mut map = BTreeMap::new();
        map.insert("orderId", params.order_id.clone());
        map.insert("timestamp", params.timestamp.to_string());
        self.sign_params(&map)
    }

    fn secure_payment_data(&self, mut request: PaymentRequest) -> AdvisorResult<PaymentRequest> {
        let timestamp = Utc::now().timestamp_millis();
        let nonce = Uuid::new_v4().simple().to_string();

        let mut map = BTreeMap::new();
        map.insert("orderId", request.order_id.clone());
        map.insert("amount", request.amount.normalize().to_string());
        map.insert(
            "paymentMethod",
            request
                .payment_method
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_default(),
        );
        map.insert("timestamp", timestamp.to_string());
        map.insert("nonce", nonce.clone());

        let signature = self.sign_params(&map)?;
        let device_token = self.encrypt_device_info(&self.device)?;

        request.security = Some(SecurityEnvelope {
            timestamp,
            nonce,
            signature,
            device_token: Some(device_token),
        });
        Ok(request)
    }
}
