//! Payment history, newest first.
//!
//! Every attempt gets its own `attempt_id`; transitions out of PROCESSING
//! address that id, so two attempts for the same order never update each
//! other's record.

use crate::payments::types::PaymentMethod;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryStatus {
    Processing,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryRecord {
    pub attempt_id: Uuid,
    pub order_id: String,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub create_time: DateTime<Utc>,
    pub complete_time: Option<DateTime<Utc>>,
    pub status: HistoryStatus,
    pub error_message: Option<String>,
}

impl PaymentHistoryRecord {
    pub fn processing(
        order_id: impl Into<String>,
        payment_method: PaymentMethod,
        amount: Decimal,
    ) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            order_id: order_id.into(),
            payment_method,
            amount,
            create_time: Utc::now(),
            complete_time: None,
            status: HistoryStatus::Processing,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentHistory {
    records: VecDeque<PaymentHistoryRecord>,
}

impl PaymentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a record and return its attempt id.
    pub fn push(&mut self, record: PaymentHistoryRecord) -> Uuid {
        let attempt_id = record.attempt_id;
        debug!(
            attempt_id = %attempt_id,
            order_id = %record.order_id,
            status = ?record.status,
            "Payment history record added"
        );
        self.records.push_front(record);
        attempt_id
    }

    pub fn get(&self, attempt_id: Uuid) -> Option<&PaymentHistoryRecord> {
        self.records.iter().find(|r| r.attempt_id == attempt_id)
    }

    /// Move a PROCESSING attempt to SUCCESS. Returns `false` when the attempt
    /// is unknown or already terminal.
    pub fn mark_success(&mut self, attempt_id: Uuid) -> bool {
        self.complete(attempt_id, HistoryStatus::Success, None)
    }

    pub fn mark_failed(&mut self, attempt_id: Uuid, error_message: Option<String>) -> bool {
        self.complete(attempt_id, HistoryStatus::Failed, error_message)
    }

    fn complete(
        &mut self,
        attempt_id: Uuid,
        status: HistoryStatus,
        error_message: Option<String>,
    ) -> bool {
        match self
            .records
            .iter_mut()
            .find(|r| r.attempt_id == attempt_id)
        {
            Some(record) if record.status == HistoryStatus::Processing => {
                record.status = status;
                record.error_message = error_message;
                record.complete_time = Some(Utc::now());
                true
            }
            Some(record) => {
                warn!(
                    attempt_id = %attempt_id,
                    status = ?record.status,
                    "Ignoring transition of a completed payment attempt"
                );
                false
            }
            None => false,
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<PaymentHistoryRecord> {
        self.records.iter().take(limit).cloned().collect()
    }

    pub fn all(&self) -> Vec<PaymentHistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
