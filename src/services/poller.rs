//! Payment status poller
//!
//! One spawned task per poll session. Each tick waits `interval`, then bumps
//! the tick counter; once the counter passes `max_retries` the session ends
//! with [`PollOutcome::Timeout`]. Otherwise the status source is queried and a
//! terminal outcome ends the session. Query errors are logged and the next
//! tick is scheduled as usual: not being able to ask about a payment is not
//! the same as the payment failing.
//!
//! Cancellation is checked before every tick and before the callback runs. A
//! cancelled session never invokes its callback.

use crate::config::PollingConfig;
use crate::error::EngineResult;
use crate::payments::status::{PaymentOutcome, PaymentStatusReport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

pub const POLL_TIMEOUT_MESSAGE: &str = "payment timed out, please check the order status manually";
pub const PAYMENT_FAILED_MESSAGE: &str = "payment failed";

/// Anything that can answer "what is the status of this order".
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn query_status(&self, order_id: &str) -> EngineResult<PaymentStatusReport>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Success { report: PaymentStatusReport },
    Failed { error: String },
    Timeout { message: String },
}

/// Handle to a running poll session.
pub struct PollHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the session. Takes effect at the next check point; the callback
    /// is not invoked afterwards.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session task to exit.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    config: PollingConfig,
}

impl StatusPoller {
    pub fn new(config: PollingConfig) -> Self {
        Self { config }
    }

    pub fn start<S, F>(
        &self,
        source: Arc<S>,
        order_id: impl Into<String>,
        callback: F,
    ) -> PollHandle
    where
        S: StatusSource + ?Sized + 'static,
        F: FnOnce(PollOutcome) + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let order_id = order_id.into();
        let config = self.config;

        info!(
            order_id = %order_id,
            interval_ms = config.interval.as_millis() as u64,
            max_retries = config.max_retries,
            "Payment status polling started"
        );

        let task = tokio::spawn(run_session(source, order_id, config, cancel_rx, callback));

        PollHandle { cancel_tx, task }
    }
}

async fn run_session<S, F>(
    source: Arc<S>,
    order_id: String,
    config: PollingConfig,
    mut cancel_rx: watch::Receiver<bool>,
    callback: F,
) where
    S: StatusSource + ?Sized,
    F: FnOnce(PollOutcome) + Send,
{
    let mut retry_count: u32 = 0;

    let outcome = loop {
        let cancelled = tokio::select! {
            _ = wait_for_cancel(&mut cancel_rx) => true,
            _ = tokio::time::sleep(config.interval) => false,
        };
        if cancelled || *cancel_rx.borrow() {
            info!(order_id = %order_id, ticks = retry_count, "Payment status polling cancelled");
            return;
        }

        retry_count += 1;
        if retry_count > config.max_retries {
            warn!(order_id = %order_id, ticks = retry_count, "Payment status polling timed out");
            break PollOutcome::Timeout {
                message: POLL_TIMEOUT_MESSAGE.to_string(),
            };
        }

        match source.query_status(&order_id).await {
            Ok(report) => match report.outcome.clone() {
                PaymentOutcome::Succeeded => break PollOutcome::Success { report },
                PaymentOutcome::Failed { message } => {
                    break PollOutcome::Failed {
                        error: message.unwrap_or_else(|| PAYMENT_FAILED_MESSAGE.to_string()),
                    }
                }
                PaymentOutcome::Pending => {
                    debug!(order_id = %order_id, tick = retry_count, "Payment still pending");
                }
            },
            Err(e) => {
                warn!(
                    order_id = %order_id,
                    tick = retry_count,
                    error = %e,
                    "Payment status query failed, polling continues"
                );
            }
        }
    };

    if *cancel_rx.borrow() {
        info!(order_id = %order_id, "Payment status polling cancelled before completion");
        return;
    }

    info!(
        order_id = %order_id,
        ticks = retry_count,
        outcome = ?outcome,
        "Payment status polling finished"
    );
    callback(outcome);
}

/// Resolves once cancellation is requested. A dropped handle does not cancel.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
