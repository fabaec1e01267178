//! Client-side payment orchestration engine.
//!
//! A [`PaymentEngine`] drives one user session through the payment lifecycle:
//! method selection, risk and lock gating, order or balance dispatch, status
//! polling with a result cache, and a per-attempt payment history. The backend
//! and the security advisor are injected through [`PaymentGateway`] and
//! [`SecurityAdvisor`].

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod payments;
pub mod security;
pub mod services;

pub use config::{ConfigError, EngineConfig, LockPolicy, LogFormat, LoggingConfig, PollingConfig};
pub use error::{EngineResult, ErrorCode, PaymentEngineError};
pub use logging::init_tracing;
pub use payments::{PaymentGateway, PaymentMethod, PaymentRequest};
pub use security::{RiskLevel, RuleBasedAdvisor, SecurityAdvisor};
pub use services::{PaymentDispatch, PaymentEngine, PollHandle, PollOutcome};
