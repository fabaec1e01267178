//! Payment API boundary: request/response types, the gateway trait and the
//! status normalisation applied to everything the gateway returns.

pub mod error;
pub mod gateway;
pub mod status;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use gateway::PaymentGateway;
pub use status::{normalize_status, PaymentOutcome, PaymentStatusReport};
pub use types::{
    BalancePayResponse, OrderInfo, PasswordVerification, PaymentMethod, PaymentMethodInfo,
    PaymentReceipt, PaymentRequest, RawPaymentStatus, SecurityEnvelope, ORDER_AWAITING_PAYMENT,
};
