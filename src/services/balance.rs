//! Locally tracked wallet balance.
//!
//! A balance payment never edits the confirmed balance directly. It places a
//! pending debit under its attempt id; the debit is settled when the payment
//! is confirmed, released when it fails, and dropped wholesale when the
//! balance is reconciled against the server.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct BalanceLedger {
    confirmed: Decimal,
    pending: HashMap<Uuid, Decimal>,
}

impl BalanceLedger {
    pub fn new(confirmed: Decimal) -> Self {
        Self {
            confirmed,
            pending: HashMap::new(),
        }
    }

    pub fn confirmed(&self) -> Decimal {
        self.confirmed
    }

    pub fn pending_total(&self) -> Decimal {
        self.pending.values().copied().sum()
    }

    /// What the user can still spend: confirmed minus pending debits.
    pub fn available(&self) -> Decimal {
        self.confirmed - self.pending_total()
    }

    pub fn has_pending(&self, attempt_id: Uuid) -> bool {
        self.pending.contains_key(&attempt_id)
    }

    pub fn hold(&mut self, attempt_id: Uuid, amount: Decimal) {
        debug!(attempt_id = %attempt_id, amount = %amount, "Pending debit placed");
        self.pending.insert(attempt_id, amount);
    }

    /// Apply a pending debit to the confirmed balance.
    pub fn settle(&mut self, attempt_id: Uuid) -> Option<Decimal> {
        let amount = self.pending.remove(&attempt_id)?;
        self.confirmed -= amount;
        debug!(attempt_id = %attempt_id, amount = %amount, "Pending debit settled");
        Some(amount)
    }

    /// Drop a pending debit without touching the confirmed balance.
    pub fn release(&mut self, attempt_id: Uuid) -> Option<Decimal> {
        let amount = self.pending.remove(&attempt_id)?;
        debug!(attempt_id = %attempt_id, amount = %amount, "Pending debit released");
        Some(amount)
    }

    /// Replace local state with the server balance, which already reflects
    /// every debit the server accepted.
    pub fn reconcile(&mut self, server_balance: Decimal) {
        if !self.pending.is_empty() || self.confirmed != server_balance {
            info!(
                local = %self.confirmed,
                server = %server_balance,
                pending_debits = self.pending.len(),
                "Balance reconciled with server"
            );
        }
        self.confirmed = server_balance;
        self.pending.clear();
    }
}
