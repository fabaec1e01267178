//! Security advisor contract, the reference rule-based advisor and the
//! risk & lock gate that consumes it.

pub mod advisor;
pub mod gate;
pub mod rules;

pub use advisor::{
    AdvisorError, AdvisorResult, DeviceInfo, RiskAssessment, RiskLevel, SecurityAdvisor,
    SignatureParams,
};
pub use gate::{
    EnvironmentReport, LockStatus, RiskDecision, RiskGate, SecurityState, SecuritySummary,
};
pub use rules::{validate_password_format, EnvironmentProbe, RuleBasedAdvisor};
