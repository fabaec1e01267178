//! Payment Engine
//!
//! Session-scoped orchestrator for the client-visible payment lifecycle:
//! method selection, gated payment dispatch, status tracking, result caching,
//! history and the locally tracked balance. One instance per user session;
//! nothing here is global.

use crate::cache::{CachedResult, ResultCache};
use crate::config::EngineConfig;
use crate::error::{EngineResult, PaymentEngineError};
use crate::payments::gateway::PaymentGateway;
use crate::payments::status::{PaymentOutcome, PaymentStatusReport};
use crate::payments::types::{
    BalancePayResponse, OrderInfo, PasswordVerification, PaymentMethod, PaymentMethodInfo,
    PaymentReceipt, PaymentRequest, ORDER_AWAITING_PAYMENT,
};
use crate::security::advisor::{RiskLevel, SecurityAdvisor, SignatureParams};
use crate::security::gate::{
    EnvironmentReport, LockStatus, RiskDecision, RiskGate, SecurityState, SecuritySummary,
};
use crate::security::rules::validate_password_format;
use crate::services::balance::BalanceLedger;
use crate::services::history::{PaymentHistory, PaymentHistoryRecord, DEFAULT_RECENT_LIMIT};
use crate::services::poller::{PollHandle, PollOutcome, StatusPoller, StatusSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Fixed payment window for orders awaiting payment, in seconds.
pub const PAYMENT_WINDOW_SECS: i64 = 30 * 60;

pub const DEFAULT_LOCK_REASON: &str = "payments are locked";
pub const DEFAULT_RISK_REASON: &str = "payment blocked by risk control";
pub const PASSWORD_LOCK_REASON: &str = "too many incorrect payment password attempts";
const PAYMENT_FAILED: &str = "payment failed";
const BALANCE_PAYMENT_FAILED: &str = "balance payment failed";
pub const SUPERSEDED_ATTEMPT_MESSAGE: &str = "superseded by a later payment attempt";

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub loading: bool,
    pub success: bool,
    pub error: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    fn loading(order_id: &str) -> Self {
        Self {
            loading: true,
            success: false,
            error: None,
            order_id: Some(order_id.to_string()),
        }
    }

    pub fn phase(&self) -> StatusPhase {
        if self.loading {
            StatusPhase::Loading
        } else if self.error.is_some() {
            StatusPhase::Failed
        } else if self.success {
            StatusPhase::Succeeded
        } else {
            StatusPhase::Idle
        }
    }
}

/// What `secure_payment` dispatched to.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentDispatch {
    Order(PaymentReceipt),
    Balance(BalancePayResponse),
}

// ============================================================================
// Session State
// ============================================================================

struct SessionState {
    payment_methods: Vec<PaymentMethodInfo>,
    selected_method: PaymentMethod,
    status: PaymentStatus,
    history: PaymentHistory,
    ledger: BalanceLedger,
    /// Unresolved attempts per order, oldest first.
    open_attempts: HashMap<String, Vec<Uuid>>,
}

impl SessionState {
    fn fail(&mut self, message: String) {
        self.status.loading = false;
        self.status.error = Some(message);
    }

    fn open_attempt(&mut self, order_id: &str, attempt_id: Uuid) {
        self.open_attempts
            .entry(order_id.to_string())
            .or_default()
            .push(attempt_id);
    }

    /// Close every open attempt of `order_id`. The newest one takes the
    /// verdict; earlier ones are marked failed as superseded and their
    /// pending debits are released.
    fn resolve_attempts(&mut self, order_id: &str, outcome: &PaymentOutcome) {
        let mut attempts = match self.open_attempts.remove(order_id) {
            Some(attempts) => attempts,
            None => return,
        };
        let latest = match attempts.pop() {
            Some(latest) => latest,
            None => return,
        };

        for superseded in attempts {
            self.history.mark_failed(superseded, Some(SUPERSEDED_ATTEMPT_MESSAGE.to_string()));
            self.ledger.release(superseded);
            debug!(order_id = %order_id, attempt_id = %superseded, "Payment attempt superseded");
        }

        match outcome {
            PaymentOutcome::Succeeded => {
                self.history.mark_success(latest);
                self.ledger.settle(latest);
            }
            PaymentOutcome::Failed { message } => {
                self.history.mark_failed(latest, message.clone());
                if self.ledger.release(latest).is_some() {
                    warn!(
                        order_id = %order_id,
                        attempt_id = %latest,
                        "Balance payment reported failed, debit released"
                    );
                }
            }
            PaymentOutcome::Pending => {}
        }
    }
}

// ============================================================================
// Payment Engine
// ============================================================================

pub struct PaymentEngine {
    gateway: Arc<dyn PaymentGateway>,
    advisor: Arc<dyn SecurityAdvisor>,
    config: EngineConfig,
    poller: StatusPoller,
    session: RwLock<SessionState>,
    results: RwLock<ResultCache<PaymentStatusReport>>,
    gate: RwLock<RiskGate>,
}

impl PaymentEngine {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        advisor: Arc<dyn SecurityAdvisor>,
        config: EngineConfig,
    ) -> Self {
        let session = SessionState {
            payment_methods: Vec::new(),
            selected_method: config.default_payment_method.clone(),
            status: PaymentStatus::default(),
            history: PaymentHistory::new(),
            ledger: BalanceLedger::default(),
            open_attempts: HashMap::new(),
        };

        Self {
            gateway,
            advisor: advisor.clone(),
            poller: StatusPoller::new(config.polling),
            gate: RwLock::new(RiskGate::new(advisor, config.lock_policy)),
            session: RwLock::new(session),
            results: RwLock::new(ResultCache::new()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Payment Methods & Balance
    // =========================================================================

    pub async fn get_payment_methods(
        &self,
        order_type: Option<&str>,
    ) -> EngineResult<Vec<PaymentMethodInfo>> {
        let methods = self
            .gateway
            .get_payment_methods(order_type)
            .await
            .map_err(|e| {
                error!(order_type = ?order_type, error = %e, "Failed to load payment methods");
                e
            })?;

        self.session.write().await.payment_methods = methods.clone();
        Ok(methods)
    }

    pub async fn set_selected_method(&self, method: PaymentMethod) {
        debug!(method = %method, "Payment method selected");
        self.session.write().await.selected_method = method;
    }

    pub async fn selected_method(&self) -> PaymentMethod {
        self.session.read().await.selected_method.clone()
    }

    pub async fn selected_payment_method(&self) -> Option<PaymentMethodInfo> {
        let session = self.session.read().await;
        session
            .payment_methods
            .iter()
            .find(|m| m.code == session.selected_method)
            .cloned()
    }

    /// Methods usable for an order: filtered by order type, and without
    /// BALANCE when the available balance cannot cover `amount`.
    pub async fn available_payment_methods(
        &self,
        order_type: Option<&str>,
        amount: Option<Decimal>,
    ) -> Vec<PaymentMethodInfo> {
        let session = self.session.read().await;
        let available = session.ledger.available();

        session
            .payment_methods
            .iter()
            .filter(|m| order_type.map_or(true, |t| m.supports_order_type(t)))
            .filter(|m| match amount {
                Some(amount) if available < amount => !m.code.is_balance(),
                _ => true,
            })
            .cloned()
            .collect()
    }

    /// Confirmed balance minus pending debits.
    pub async fn user_balance(&self) -> Decimal {
        self.session.read().await.ledger.available()
    }

    pub async fn confirmed_balance(&self) -> Decimal {
        self.session.read().await.ledger.confirmed()
    }

    pub async fn formatted_balance(&self) -> String {
        format!("{:.2}", self.user_balance().await)
    }

    pub async fn is_balance_sufficient(&self, amount: Decimal) -> bool {
        self.user_balance().await >= amount
    }

    /// Replace the local balance with a known server value.
    pub async fn set_user_balance(&self, balance: Decimal) {
        self.session.write().await.ledger.reconcile(balance);
    }

    /// Fetch the server balance and reconcile the local ledger with it.
    pub async fn refresh_user_balance(&self) -> EngineResult<Decimal> {
        let balance = self.gateway.get_user_balance().await.map_err(|e| {
            error!(error = %e, "Failed to load user balance");
            e
        })?;
        self.set_user_balance(balance).await;
        Ok(balance)
    }

    // =========================================================================
    // Payment Execution
    // =========================================================================

    pub async fn create_payment_order(
        &self,
        request: PaymentRequest,
    ) -> EngineResult<PaymentReceipt> {
        let method = {
            let mut session = self.session.write().await;
            session.status = PaymentStatus::loading(&request.order_id);
            request
                .payment_method
                .clone()
                .unwrap_or_else(|| session.selected_method.clone())
        };

        let order_id = request.order_id.clone();
        let amount = request.amount;
        let outgoing = PaymentRequest {
            payment_method: Some(method.clone()),
            ..request
        };

        info!(order_id = %order_id, method = %method, amount = %amount, "Creating payment order");

        match self.gateway.create_payment(outgoing).await {
            Ok(receipt) => {
                self.results
                    .write()
                    .await
                    .put(order_id.clone(), PaymentStatusReport::from_receipt(&receipt));

                let mut session = self.session.write().await;
                session.status.loading = false;
                session.status.success = true;
                let attempt_id = session
                    .history
                    .push(PaymentHistoryRecord::processing(&order_id, method, amount));
                session.open_attempt(&order_id, attempt_id);

                info!(order_id = %order_id, attempt_id = %attempt_id, "Payment order created");
                Ok(receipt)
            }
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Failed to create payment order");
                self.session.write().await.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Pay from the wallet balance. An accepted payment is recorded as
    /// PROCESSING with a pending debit; both resolve on the order's status
    /// verdict, and the debit is also dropped on the next server reconcile.
    pub async fn execute_balance_payment(
        &self,
        request: PaymentRequest,
    ) -> EngineResult<BalancePayResponse> {
        self.session.write().await.status = PaymentStatus::loading(&request.order_id);

        let order_id = request.order_id.clone();
        let amount = request.amount;

        info!(order_id = %order_id, amount = %amount, "Executing balance payment");

        let response = match self.gateway.balance_pay(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Balance payment failed");
                self.session.write().await.fail(e.to_string());
                return Err(e.into());
            }
        };

        if !response.success {
            let message = response
                .message
                .clone()
                .unwrap_or_else(|| BALANCE_PAYMENT_FAILED.to_string());
            warn!(order_id = %order_id, message = %message, "Balance payment declined");
            self.session.write().await.fail(message.clone());
            return Err(PaymentEngineError::BalancePaymentDeclined { message });
        }

        self.results
            .write()
            .await
            .put(order_id.clone(), PaymentStatusReport::from_balance(&response));

        let mut session = self.session.write().await;
        session.status.loading = false;
        session.status.success = true;
        let attempt_id = session.history.push(PaymentHistoryRecord::processing(
            &order_id,
            PaymentMethod::Balance,
            amount,
        ));
        session.ledger.hold(attempt_id, amount);
        session.open_attempt(&order_id, attempt_id);

        info!(
            order_id = %order_id,
            attempt_id = %attempt_id,
            available_balance = %session.ledger.available(),
            "Balance payment accepted"
        );
        Ok(response)
    }

    /// Gated pipeline: lock check, risk assessment, password requirement,
    /// payload protection, dispatch. Any failure is also recorded as a
    /// security warning before it is returned.
    pub async fn secure_payment(&self, request: PaymentRequest) -> EngineResult<PaymentDispatch> {
        let order_id = request.order_id.clone();
        let result = self.run_secure_payment(request).await;

        if let Err(e) = &result {
            error!(order_id = %order_id, error = %e, "Secure payment failed");
            self.gate.write().await.add_warning(e.to_string());
        }
        result
    }

    async fn run_secure_payment(&self, request: PaymentRequest) -> EngineResult<PaymentDispatch> {
        // 1. Lock
        let lock = self.check_payment_lock_status().await;
        if lock.locked {
            return Err(PaymentEngineError::PaymentLocked {
                reason: lock.reason.unwrap_or_else(|| DEFAULT_LOCK_REASON.to_string()),
            });
        }

        // 2. Risk
        let decision = self.perform_risk_assessment(&request).await;
        if decision.locked {
            return Err(PaymentEngineError::RiskRejected {
                reason: decision
                    .reason
                    .unwrap_or_else(|| DEFAULT_RISK_REASON.to_string()),
            });
        }

        // 3. Password for medium risk, high value payments
        if decision.level == RiskLevel::Medium
            && request.amount > self.config.password_amount_threshold
            && !self.gate.read().await.state().payment_password_verified
        {
            return Err(PaymentEngineError::PasswordRequired);
        }

        // 4. Protect payload
        let secured = self.advisor.secure_payment_data(request)?;

        // 5. Dispatch on the method the advisor left in place
        if secured
            .payment_method
            .as_ref()
            .map_or(false, PaymentMethod::is_balance)
        {
            self.execute_balance_payment(secured)
                .await
                .map(PaymentDispatch::Balance)
        } else {
            self.create_payment_order(secured)
                .await
                .map(PaymentDispatch::Order)
        }
    }

    // =========================================================================
    // Status Tracking
    // =========================================================================

    /// Cache-first status lookup. Transport errors propagate to the caller.
    pub async fn query_payment_status(&self, order_id: &str) -> EngineResult<PaymentStatusReport> {
        {
            let results = self.results.read().await;
            if let Some(entry) = results.get(order_id) {
                if entry.is_fresh(self.config.status_cache_ttl, Utc::now()) {
                    debug!(order_id = %order_id, "Payment status served from cache");
                    return Ok(entry.result.clone());
                }
            }
        }

        let raw = self
            .gateway
            .get_payment_status(order_id)
            .await
            .map_err(|e| {
                error!(order_id = %order_id, error = %e, "Failed to query payment status");
                e
            })?;
        let report = PaymentStatusReport::from_status(raw);

        self.results
            .write()
            .await
            .put(order_id.to_string(), report.clone());
        self.apply_outcome(order_id, &report.outcome).await;

        Ok(report)
    }

    async fn apply_outcome(&self, order_id: &str, outcome: &PaymentOutcome) {
        let mut session = self.session.write().await;
        match outcome {
            PaymentOutcome::Succeeded => {
                session.status.success = true;
                session.status.order_id = Some(order_id.to_string());
                session.resolve_attempts(order_id, outcome);
                info!(order_id = %order_id, "Payment confirmed");
            }
            PaymentOutcome::Failed { message } => {
                session.status.success = false;
                session.status.error = Some(
                    message
                        .clone()
                        .unwrap_or_else(|| PAYMENT_FAILED.to_string()),
                );
                session.status.order_id = Some(order_id.to_string());
                session.resolve_attempts(order_id, outcome);
                warn!(order_id = %order_id, message = ?message, "Payment failed");
            }
            PaymentOutcome::Pending => {}
        }
    }

    /// Poll the order until it resolves, times out or the handle is cancelled.
    pub fn start_payment_polling<F>(
        self: &Arc<Self>,
        order_id: impl Into<String>,
        callback: F,
    ) -> PollHandle
    where
        F: FnOnce(PollOutcome) + Send + 'static,
    {
        self.poller.start(Arc::clone(self), order_id, callback)
    }

    pub async fn payment_status(&self) -> PaymentStatus {
        self.session.read().await.status.clone()
    }

    pub async fn reset_payment_status(&self) {
        self.session.write().await.status = PaymentStatus::default();
    }

    pub async fn cached_result(&self, order_id: &str) -> Option<CachedResult<PaymentStatusReport>> {
        self.results.read().await.get(order_id).cloned()
    }

    /// Drop one cached result, or all of them when `order_id` is `None`.
    pub async fn clear_payment_cache(&self, order_id: Option<&str>) {
        self.results.write().await.clear(order_id);
    }

    pub async fn payment_history(&self) -> Vec<PaymentHistoryRecord> {
        self.session.read().await.history.all()
    }

    pub async fn recent_payment_history(&self, limit: Option<usize>) -> Vec<PaymentHistoryRecord> {
        self.session
            .read()
            .await
            .history
            .recent(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
    }

    pub fn get_payment_remaining_time(&self, order: Option<&OrderInfo>) -> i64 {
        payment_remaining_time(order)
    }

    // =========================================================================
    // Security
    // =========================================================================

    pub async fn check_environment_security(&self) -> EnvironmentReport {
        self.gate.write().await.check_environment_security()
    }

    pub async fn perform_risk_assessment(&self, request: &PaymentRequest) -> RiskDecision {
        self.gate.write().await.perform_risk_assessment(request)
    }

    pub async fn check_payment_lock_status(&self) -> LockStatus {
        self.gate.read().await.check_payment_lock_status()
    }

    pub async fn reset_security_state(&self) {
        self.gate.write().await.reset();
    }

    pub async fn security_state(&self) -> SecurityState {
        self.gate.read().await.state().clone()
    }

    pub async fn security_summary(&self) -> SecuritySummary {
        self.gate.read().await.summary()
    }

    pub async fn should_show_security_alert(&self) -> bool {
        self.gate.read().await.should_show_security_alert()
    }

    pub async fn security_warnings(&self) -> Vec<String> {
        self.gate.read().await.state().security_warnings.clone()
    }

    pub async fn clear_security_warnings(&self) {
        self.gate.write().await.clear_warnings();
    }

    /// Check a payment password with the backend. A wrong password returns
    /// `Ok(false)`; reaching the configured number of consecutive wrong
    /// passwords sets the payment lock.
    pub async fn verify_payment_password(
        &self,
        password: &str,
        order_id: &str,
    ) -> EngineResult<bool> {
        let result = self.run_password_verification(password, order_id).await;

        let mut gate = self.gate.write().await;
        match &result {
            Ok(true) => {
                gate.set_password_verified(true);
                gate.record_password_success();
                info!(order_id = %order_id, "Payment password verified");
            }
            Ok(false) => {
                gate.set_password_verified(false);
                gate.record_password_failure(
                    self.config.max_password_attempts,
                    PASSWORD_LOCK_REASON,
                );
            }
            Err(e) => {
                gate.set_password_verified(false);
                error!(order_id = %order_id, error = %e, "Payment password verification failed");
            }
        }
        result
    }

    async fn run_password_verification(
        &self,
        password: &str,
        order_id: &str,
    ) -> EngineResult<bool> {
        validate_password_format(password)
            .map_err(|reason| PaymentEngineError::InvalidPassword { reason })?;

        let timestamp = Utc::now().timestamp_millis();
        let encrypted_password = self.advisor.encrypt_password(password)?;
        let signature = self.advisor.generate_signature(&SignatureParams {
            order_id: order_id.to_string(),
            timestamp,
        })?;

        let verified = self
            .gateway
            .verify_payment_password(PasswordVerification {
                order_id: order_id.to_string(),
                encrypted_password,
                signature,
                timestamp,
            })
            .await?;
        Ok(verified)
    }
}

#[async_trait]
impl StatusSource for PaymentEngine {
    async fn query_status(&self, order_id: &str) -> EngineResult<PaymentStatusReport> {
        self.query_payment_status(order_id).await
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Seconds left to pay an order, 0 unless it is awaiting payment.
pub fn payment_remaining_time(order: Option<&OrderInfo>) -> i64 {
    payment_remaining_time_at(order, Utc::now())
}

pub fn payment_remaining_time_at(order: Option<&OrderInfo>, now: DateTime<Utc>) -> i64 {
    let order = match order {
        Some(order) if order.order_status == ORDER_AWAITING_PAYMENT => order,
        _ => return 0,
    };

    let elapsed = now
        .signed_duration_since(order.create_time)
        .num_seconds()
        .max(0);
    (PAYMENT_WINDOW_SECS - elapsed).max(0)
}

// ============================================================================
// Tests
// ============================================================================
