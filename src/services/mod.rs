//! Services module for the payment lifecycle

pub mod balance;
pub mod history;
pub mod payment_engine;
pub mod poller;

// Re-export engine types
pub use crate::services::balance::BalanceLedger;
pub use crate::services::history::{
    HistoryStatus, PaymentHistory, PaymentHistoryRecord, DEFAULT_RECENT_LIMIT,
};
pub use crate::services::payment_engine::{
    payment_remaining_time, payment_remaining_time_at, PaymentDispatch, PaymentEngine,
    PaymentStatus, StatusPhase, PASSWORD_LOCK_REASON, PAYMENT_WINDOW_SECS,
    SUPERSEDED_ATTEMPT_MESSAGE,
};
pub use crate::services::poller::{
    PollHandle, PollOutcome, StatusPoller, StatusSource, PAYMENT_FAILED_MESSAGE,
    POLL_TIMEOUT_MESSAGE,
};
