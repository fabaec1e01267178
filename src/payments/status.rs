//! Normalisation of payment status bodies.
//!
//! The backend reports a verdict through either a boolean (`paid` / `failed`)
//! or a string (`status == "SUCCESS" | "FAILED"`). Bodies are folded into a
//! [`PaymentOutcome`] exactly once, when they cross the gateway boundary.

use crate::payments::types::{BalancePayResponse, PaymentReceipt, RawPaymentStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Succeeded,
    Failed { message: Option<String> },
    Pending,
}

impl PaymentOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentOutcome::Pending)
    }
}

/// Success wins over failure when a body claims both.
pub fn normalize_status(raw: &RawPaymentStatus) -> PaymentOutcome {
    let status = raw.status.as_deref();
    if raw.paid == Some(true) || status == Some("SUCCESS") {
        PaymentOutcome::Succeeded
    } else if raw.failed == Some(true) || status == Some("FAILED") {
        PaymentOutcome::Failed {
            message: raw.message.clone(),
        }
    } else {
        PaymentOutcome::Pending
    }
}

/// A normalised status plus the body it was derived from. This is what the
/// result cache stores and what status queries return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusReport {
    pub outcome: PaymentOutcome,
    pub payload: JsonValue,
}

impl PaymentStatusReport {
    pub fn from_status(raw: RawPaymentStatus) -> Self {
        let outcome = normalize_status(&raw);
        let payload = serde_json::to_value(&raw).unwrap_or(JsonValue::Null);
        Self { outcome, payload }
    }

    /// Order-payment receipts are opaque; they are read as status bodies and
    /// count as pending unless they carry a verdict themselves.
    pub fn from_receipt(receipt: &PaymentReceipt) -> Self {
        let outcome = serde_json::from_value::<RawPaymentStatus>(receipt.clone())
            .map(|raw| normalize_status(&raw))
            .unwrap_or(PaymentOutcome::Pending);
        Self {
            outcome,
            payload: receipt.clone(),
        }
    }

    /// An accepted balance payment is not a verdict on the order. The body
    /// goes through the receipt path, so it stays pending unless it carries
    /// status fields of its own.
    pub fn from_balance(response: &BalancePayResponse) -> Self {
        let payload = serde_json::to_value(response).unwrap_or(JsonValue::Null);
        Self::from_receipt(&payload)
    }
}
