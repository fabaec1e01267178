//! Risk & lock gate
//!
//! Owns the [`SecurityState`] of a session and is the only place that mutates
//! it. Advisor failures never escape from here: an environment check failure
//! marks the environment insecure, and an assessment failure degrades to
//! MEDIUM risk.

use crate::config::LockPolicy;
use crate::payments::types::PaymentRequest;
use crate::security::advisor::{DeviceInfo, RiskLevel, SecurityAdvisor};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const ENVIRONMENT_INSECURE_REASON: &str = "environment insecure";
pub const ENVIRONMENT_LOCK_REASON: &str =
    "environment insecure, payments are temporarily unavailable";
pub const DEFAULT_HIGH_RISK_REASON: &str = "payment flagged as high risk";
pub const ENVIRONMENT_CHECK_WARNING: &str =
    "environment security check failed, use a trusted browser or device";
pub const RISK_CHECK_WARNING: &str = "risk check unavailable, proceed with caution";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityState {
    pub risk_level: RiskLevel,
    pub risk_advice: Vec<String>,
    pub payment_locked: bool,
    pub lock_reason: Option<String>,
    pub environment_secure: bool,
    /// Insertion ordered, unique by value
    pub security_warnings: Vec<String>,
    pub device_info: Option<DeviceInfo>,
    pub payment_password_verified: bool,
}

impl Default for SecurityState {
    fn default() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            risk_advice: Vec::new(),
            payment_locked: false,
            lock_reason: None,
            environment_secure: true,
            security_warnings: Vec::new(),
            device_info: None,
            payment_password_verified: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub locked: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReport {
    pub is_secure: bool,
    pub device_info: Option<DeviceInfo>,
    pub encrypted_device_info: Option<String>,
    pub error: Option<String>,
}

/// Result of one risk assessment as seen by the payment pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDecision {
    pub level: RiskLevel,
    pub locked: bool,
    pub reason: Option<String>,
    pub advice: Vec<String>,
    /// Set when the advisor failed and the level is the MEDIUM fallback
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecuritySummary {
    pub risk_level: RiskLevel,
    pub locked: bool,
    pub secure: bool,
    pub warnings: Vec<String>,
    pub advice: Vec<String>,
}

pub struct RiskGate {
    advisor: Arc<dyn SecurityAdvisor>,
    lock_policy: LockPolicy,
    state: SecurityState,
    failed_password_attempts: u32,
}

impl RiskGate {
    pub fn new(advisor: Arc<dyn SecurityAdvisor>, lock_policy: LockPolicy) -> Self {
        Self {
            advisor,
            lock_policy,
            state: SecurityState::default(),
            failed_password_attempts: 0,
        }
    }

    pub fn state(&self) -> &SecurityState {
        &self.state
    }

    /// Probe the environment and collect a device fingerprint. Fails closed.
    pub fn check_environment_security(&mut self) -> EnvironmentReport {
        let probe = self.advisor.check_environment().and_then(|is_secure| {
            let device_info = self.advisor.collect_device_info()?;
            let encrypted = self.advisor.encrypt_device_info(&device_info)?;
            Ok((is_secure, device_info, encrypted))
        });

        match probe {
            Ok((is_secure, device_info, encrypted)) => {
                self.state.environment_secure = is_secure;
                self.state.device_info = Some(device_info.clone());
                if !is_secure {
                    warn!("Payment environment reported insecure");
                }
                EnvironmentReport {
                    is_secure,
                    device_info: Some(device_info),
                    encrypted_device_info: Some(encrypted),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Environment security check failed");
                self.add_warning(ENVIRONMENT_CHECK_WARNING);
                self.state.environment_secure = false;
                EnvironmentReport {
                    is_secure: false,
                    device_info: None,
                    encrypted_device_info: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn perform_risk_assessment(&mut self, request: &PaymentRequest) -> RiskDecision {
        if !self.state.environment_secure {
            // The advisor is deliberately not consulted here.
            self.state.risk_level = RiskLevel::High;
            self.set_lock(ENVIRONMENT_LOCK_REASON);
            return RiskDecision {
                level: RiskLevel::High,
                locked: true,
                reason: Some(ENVIRONMENT_INSECURE_REASON.to_string()),
                advice: Vec::new(),
                error: None,
            };
        }

        match self.advisor.perform_risk_assessment(request) {
            Ok(assessment) => {
                self.state.risk_level = assessment.level;
                self.state.risk_advice = assessment.advice.clone();

                let mut decision = RiskDecision {
                    level: assessment.level,
                    locked: false,
                    reason: None,
                    advice: assessment.advice,
                    error: None,
                };

                match assessment.level {
                    RiskLevel::High => {
                        let reason = assessment
                            .message
                            .unwrap_or_else(|| DEFAULT_HIGH_RISK_REASON.to_string());
                        self.set_lock(&reason);
                        decision.locked = true;
                        decision.reason = Some(reason);
                    }
                    RiskLevel::Low
                        if self.lock_policy == LockPolicy::ClearOnLowRisk
                            && self.state.payment_locked =>
                    {
                        info!(
                            previous_reason = ?self.state.lock_reason,
                            "Low risk assessment lifted payment lock"
                        );
                        self.state.payment_locked = false;
                        self.state.lock_reason = None;
                    }
                    _ => {}
                }

                info!(
                    order_id = %request.order_id,
                    risk_level = %decision.level,
                    locked = decision.locked,
                    "Risk assessment completed"
                );
                decision
            }
            Err(e) => {
                error!(order_id = %request.order_id, error = %e, "Risk assessment failed");
                self.state.risk_level = RiskLevel::Medium;
                self.add_warning(RISK_CHECK_WARNING);
                RiskDecision {
                    level: RiskLevel::Medium,
                    locked: false,
                    reason: None,
                    advice: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn check_payment_lock_status(&self) -> LockStatus {
        LockStatus {
            locked: self.state.payment_locked,
            reason: self.state.lock_reason.clone(),
        }
    }

    pub fn set_lock(&mut self, reason: &str) {
        warn!(reason = %reason, "Payment lock set");
        self.state.payment_locked = true;
        self.state.lock_reason = Some(reason.to_string());
    }

    /// Adds `warning` unless an identical one is already present.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.state.security_warnings.contains(&warning) {
            self.state.security_warnings.push(warning);
        }
    }

    pub fn clear_warnings(&mut self) {
        self.state.security_warnings.clear();
    }

    pub fn set_password_verified(&mut self, verified: bool) {
        self.state.payment_password_verified = verified;
    }

    /// Counts a wrong password. Returns `true` when this attempt set the lock.
    pub fn record_password_failure(&mut self, max_attempts: u32, lock_reason: &str) -> bool {
        self.failed_password_attempts += 1;
        warn!(
            failed_attempts = self.failed_password_attempts,
            max_attempts = max_attempts,
            "Payment password rejected"
        );
        if self.failed_password_attempts >= max_attempts {
            self.set_lock(lock_reason);
            return true;
        }
        false
    }

    pub fn record_password_success(&mut self) {
        self.failed_password_attempts = 0;
    }

    pub fn reset(&mut self) {
        info!("Security state reset");
        self.state = SecurityState::default();
        self.failed_password_attempts = 0;
    }

    pub fn summary(&self) -> SecuritySummary {
        SecuritySummary {
            risk_level: self.state.risk_level,
            locked: self.state.payment_locked,
            secure: self.state.environment_secure,
            warnings: self.state.security_warnings.clone(),
            advice: self.state.risk_advice.clone(),
        }
    }

    pub fn should_show_security_alert(&self) -> bool {
        self.state.risk_level == RiskLevel::High || !self.state.security_warnings.is_empty()
    }
}
