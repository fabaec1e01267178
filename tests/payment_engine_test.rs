mod common;

use campus_pay_engine::payments::{OrderInfo, PaymentMethod, PaymentOutcome, PaymentRequest};
use campus_pay_engine::security::RiskLevel;
use campus_pay_engine::services::{
    HistoryStatus, PollOutcome, StatusPhase, PAYMENT_FAILED_MESSAGE, POLL_TIMEOUT_MESSAGE,
    SUPERSEDED_ATTEMPT_MESSAGE,
};
use campus_pay_engine::PaymentEngineError;
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn low_risk_engine() -> (Arc<MockGateway>, Arc<campus_pay_engine::PaymentEngine>) {
    let gateway = Arc::new(MockGateway::new());
    let advisor = Arc::new(MockAdvisor::new(true, RiskLevel::Low));
    let engine = engine_with(gateway.clone(), advisor, fast_config());
    (gateway, engine)
}

#[tokio::test]
async fn test_cached_status_within_ttl_skips_network() {
    let (gateway, engine) = low_risk_engine();
    gateway.set_status(Ok(paid()));

    let first = engine.query_payment_status("A1").await.unwrap();
    let second = engine.query_payment_status("A1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.outcome, PaymentOutcome::Succeeded);
    assert_eq!(gateway.status_queries(), 1);
}

#[tokio::test]
async fn test_cleared_cache_goes_back_to_network() {
    let (gateway, engine) = low_risk_engine();

    engine.query_payment_status("A1").await.unwrap();
    assert!(engine.cached_result("A1").await.is_some());

    engine.clear_payment_cache(Some("A1")).await;
    assert!(engine.cached_result("A1").await.is_none());

    engine.query_payment_status("A1").await.unwrap();
    assert_eq!(gateway.status_queries(), 2);
}

#[tokio::test]
async fn test_clear_all_cached_results() {
    let (_gateway, engine) = low_risk_engine();
    engine.query_payment_status("A1").await.unwrap();
    engine.query_payment_status("B2").await.unwrap();

    engine.clear_payment_cache(None).await;

    assert!(engine.cached_result("A1").await.is_none());
    assert!(engine.cached_result("B2").await.is_none());
}

#[tokio::test]
async fn test_query_error_propagates() {
    let (gateway, engine) = low_risk_engine();
    gateway.set_status(Err(network_error()));

    let err = engine.query_payment_status("A1").await.unwrap_err();

    assert!(matches!(err, PaymentEngineError::Gateway(_)));
    assert!(engine.cached_result("A1").await.is_none());
}

#[tokio::test]
async fn test_create_order_records_processing_attempt() {
    let (gateway, engine) = low_risk_engine();

    engine
        .create_payment_order(PaymentRequest::new("A1", Decimal::from(25)))
        .await
        .unwrap();

    let status = engine.payment_status().await;
    assert_eq!(status.phase(), StatusPhase::Succeeded);
    assert_eq!(status.order_id.as_deref(), Some("A1"));

    // Method falls back to the selected one
    let sent = gateway.created.lock().unwrap()[0].clone();
    assert_eq!(sent.payment_method, Some(PaymentMethod::WechatPay));

    let history = engine.payment_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, HistoryStatus::Processing);
    assert_eq!(history[0].payment_method, PaymentMethod::WechatPay);
    assert!(engine.cached_result("A1").await.is_some());
}

#[tokio::test]
async fn test_create_order_failure_is_recorded_and_returned() {
    let (gateway, engine) = low_risk_engine();
    *gateway.create_result.lock().unwrap() = Err(network_error());

    let err = engine
        .create_payment_order(PaymentRequest::new("A1", Decimal::from(25)))
        .await
        .unwrap_err();

    let status = engine.payment_status().await;
    assert_eq!(status.phase(), StatusPhase::Failed);
    assert_eq!(status.error, Some(err.to_string()));
    assert!(engine.payment_history().await.is_empty());
}

#[tokio::test]
async fn test_status_result_only_touches_its_own_order() {
    let (gateway, engine) = low_risk_engine();
    engine
        .create_payment_order(PaymentRequest::new("A1", Decimal::from(10)))
        .await
        .unwrap();
    engine
        .create_payment_order(PaymentRequest::new("B2", Decimal::from(20)))
        .await
        .unwrap();
    engine.clear_payment_cache(None).await;

    gateway.set_status(Ok(failed("card declined")));
    engine.query_payment_status("A1").await.unwrap();

    let history = engine.payment_history().await;
    let a1 = history.iter().find(|r| r.order_id == "A1").unwrap();
    let b2 = history.iter().find(|r| r.order_id == "B2").unwrap();
    assert_eq!(a1.status, HistoryStatus::Failed);
    assert_eq!(a1.error_message.as_deref(), Some("card declined"));
    assert_eq!(b2.status, HistoryStatus::Processing);
}

#[tokio::test]
async fn test_retried_order_resolves_every_attempt() {
    let (gateway, engine) = low_risk_engine();
    for _ in 0..2 {
        engine
            .create_payment_order(PaymentRequest::new("A1", Decimal::from(10)))
            .await
            .unwrap();
    }
    engine.clear_payment_cache(None).await;
    gateway.set_status(Ok(paid()));

    engine.query_payment_status("A1").await.unwrap();

    let history = engine.payment_history().await;
    assert_ne!(history[0].attempt_id, history[1].attempt_id);
    assert_eq!(history[0].status, HistoryStatus::Success);
    assert_eq!(history[1].status, HistoryStatus::Failed);
    assert_eq!(
        history[1].error_message.as_deref(),
        Some(SUPERSEDED_ATTEMPT_MESSAGE)
    );

    // A later verdict finds nothing left to resolve
    engine.clear_payment_cache(None).await;
    engine.query_payment_status("A1").await.unwrap();
    let again = engine.payment_history().await;
    assert_eq!(again, history);
}

#[tokio::test]
async fn test_superseded_balance_attempt_releases_its_debit() {
    let (gateway, engine) = low_risk_engine();
    engine.refresh_user_balance().await.unwrap();
    engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();
    engine
        .create_payment_order(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();
    engine.clear_payment_cache(None).await;
    gateway.set_status(Ok(failed("card declined")));

    engine.query_payment_status("A1").await.unwrap();

    assert_eq!(engine.user_balance().await, Decimal::from(100));
    assert_eq!(engine.confirmed_balance().await, Decimal::from(100));

    let history = engine.payment_history().await;
    assert_eq!(history[0].payment_method, PaymentMethod::WechatPay);
    assert_eq!(history[0].status, HistoryStatus::Failed);
    assert_eq!(history[0].error_message.as_deref(), Some("card declined"));
    assert_eq!(history[1].payment_method, PaymentMethod::Balance);
    assert_eq!(history[1].status, HistoryStatus::Failed);
    assert_eq!(
        history[1].error_message.as_deref(),
        Some(SUPERSEDED_ATTEMPT_MESSAGE)
    );
}

#[tokio::test]
async fn test_recent_history_is_newest_first_and_limited() {
    let (_gateway, engine) = low_risk_engine();
    for i in 0..12 {
        engine
            .create_payment_order(PaymentRequest::new(format!("O{}", i), Decimal::ONE))
            .await
            .unwrap();
    }

    let recent = engine.recent_payment_history(None).await;
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].order_id, "O11");
    assert_eq!(engine.recent_payment_history(Some(3)).await.len(), 3);
}

#[tokio::test]
async fn test_balance_payment_places_pending_debit_until_confirmed() {
    let (gateway, engine) = low_risk_engine();
    engine.refresh_user_balance().await.unwrap();

    engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();

    assert_eq!(engine.confirmed_balance().await, Decimal::from(100));
    assert_eq!(engine.user_balance().await, Decimal::from(70));
    assert_eq!(engine.formatted_balance().await, "70.00");
    assert!(!engine.is_balance_sufficient(Decimal::from(80)).await);

    let history = engine.payment_history().await;
    assert_eq!(history[0].status, HistoryStatus::Processing);
    assert_eq!(history[0].payment_method, PaymentMethod::Balance);

    engine.clear_payment_cache(None).await;
    gateway.set_status(Ok(paid()));
    engine.query_payment_status("A1").await.unwrap();

    assert_eq!(engine.confirmed_balance().await, Decimal::from(70));
    assert_eq!(engine.user_balance().await, Decimal::from(70));
    assert_eq!(
        engine.payment_history().await[0].status,
        HistoryStatus::Success
    );
}

#[tokio::test]
async fn test_accepted_balance_payment_is_cached_as_pending() {
    let (gateway, engine) = low_risk_engine();
    engine.refresh_user_balance().await.unwrap();

    engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();

    let cached = engine.cached_result("A1").await.unwrap();
    assert_eq!(cached.result.outcome, PaymentOutcome::Pending);
    assert_eq!(gateway.status_queries(), 0);
}

#[tokio::test]
async fn test_failed_confirmation_of_balance_payment_keeps_history_and_ledger_in_step() {
    let (gateway, engine) = low_risk_engine();
    engine.refresh_user_balance().await.unwrap();
    engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();
    engine.clear_payment_cache(None).await;
    gateway.set_status(Ok(failed("reversed")));

    engine.query_payment_status("A1").await.unwrap();

    let history = engine.payment_history().await;
    assert_eq!(history[0].status, HistoryStatus::Failed);
    assert_eq!(history[0].error_message.as_deref(), Some("reversed"));
    assert_eq!(engine.user_balance().await, Decimal::from(100));
    assert_eq!(engine.confirmed_balance().await, Decimal::from(100));
}

#[tokio::test]
async fn test_polling_after_balance_payment_asks_the_server() {
    let gateway = Arc::new(MockGateway::new());
    let advisor = Arc::new(MockAdvisor::new(true, RiskLevel::Low));
    let mut config = fast_config();
    config.status_cache_ttl = Duration::ZERO;
    let engine = engine_with(gateway.clone(), advisor, config);
    engine.refresh_user_balance().await.unwrap();
    engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();
    gateway.set_status(Ok(failed("reversed")));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    engine
        .start_payment_polling("A1", move |outcome| sink.lock().unwrap().push(outcome))
        .join()
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap()[0],
        PollOutcome::Failed {
            error: "reversed".to_string()
        }
    );
    assert_eq!(gateway.status_queries(), 1);
    assert_eq!(engine.user_balance().await, Decimal::from(100));
    assert_eq!(
        engine.payment_history().await[0].status,
        HistoryStatus::Failed
    );
}

#[tokio::test]
async fn test_reconcile_replaces_pending_debits() {
    let (gateway, engine) = low_risk_engine();
    engine.refresh_user_balance().await.unwrap();
    engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap();

    *gateway.user_balance.lock().unwrap() = Decimal::from(70);
    engine.refresh_user_balance().await.unwrap();

    assert_eq!(engine.user_balance().await, Decimal::from(70));
    assert_eq!(engine.confirmed_balance().await, Decimal::from(70));
}

#[tokio::test]
async fn test_declined_balance_payment() {
    let (gateway, engine) = low_risk_engine();
    engine.refresh_user_balance().await.unwrap();
    *gateway.balance_result.lock().unwrap() = Ok(campus_pay_engine::payments::BalancePayResponse {
        success: false,
        message: Some("insufficient balance".to_string()),
        extra: Default::default(),
    });

    let err = engine
        .execute_balance_payment(PaymentRequest::new("A1", Decimal::from(30)))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PaymentEngineError::BalancePaymentDeclined {
            message: "insufficient balance".to_string()
        }
    );
    assert_eq!(engine.user_balance().await, Decimal::from(100));
    assert!(engine.payment_history().await.is_empty());
}

#[tokio::test]
async fn test_available_methods_filter_order_type_and_balance() {
    let (_gateway, engine) = low_risk_engine();
    engine.get_payment_methods(None).await.unwrap();
    engine.set_user_balance(Decimal::from(20)).await;

    let all = engine.available_payment_methods(None, None).await;
    assert_eq!(all.len(), 3);

    let dine_in = engine
        .available_payment_methods(Some("DINE_IN"), Some(Decimal::from(50)))
        .await;
    let codes: Vec<_> = dine_in.iter().map(|m| m.code.clone()).collect();
    assert_eq!(codes, vec![PaymentMethod::WechatPay]);

    engine.set_selected_method(PaymentMethod::Alipay).await;
    assert_eq!(
        engine.selected_payment_method().await.map(|m| m.code),
        Some(PaymentMethod::Alipay)
    );
}

#[tokio::test]
async fn test_reset_payment_status() {
    let (_gateway, engine) = low_risk_engine();
    engine
        .create_payment_order(PaymentRequest::new("A1", Decimal::ONE))
        .await
        .unwrap();

    engine.reset_payment_status().await;

    assert_eq!(engine.payment_status().await.phase(), StatusPhase::Idle);
}

#[tokio::test]
async fn test_polling_reports_success() {
    let (gateway, engine) = low_risk_engine();
    gateway.set_status(Ok(paid()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    engine
        .start_payment_polling("A1", move |outcome| sink.lock().unwrap().push(outcome))
        .join()
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(matches!(seen[0], PollOutcome::Success { .. }));
}

#[tokio::test]
async fn test_polling_failure_without_message() {
    let (gateway, engine) = low_risk_engine();
    gateway.set_status(Ok(campus_pay_engine::payments::RawPaymentStatus {
        failed: Some(true),
        ..Default::default()
    }));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    engine
        .start_payment_polling("A1", move |outcome| sink.lock().unwrap().push(outcome))
        .join()
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap()[0],
        PollOutcome::Failed {
            error: PAYMENT_FAILED_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn test_polling_times_out_once() {
    let gateway = Arc::new(MockGateway::new());
    let advisor = Arc::new(MockAdvisor::new(true, RiskLevel::Low));
    let mut config = fast_config();
    // Every tick must reach the gateway
    config.status_cache_ttl = Duration::ZERO;
    let engine = engine_with(gateway.clone(), advisor, config);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    engine
        .start_payment_polling("A1", move |outcome| sink.lock().unwrap().push(outcome))
        .join()
        .await
        .unwrap();

    assert_eq!(gateway.status_queries(), 30);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        PollOutcome::Timeout {
            message: POLL_TIMEOUT_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn test_cancelled_polling_never_calls_back() {
    let (_gateway, engine) = low_risk_engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let handle =
        engine.start_payment_polling("A1", move |outcome| sink.lock().unwrap().push(outcome));
    handle.cancel();
    handle.join().await.unwrap();

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_remaining_time() {
    let (_gateway, engine) = low_risk_engine();

    let ten_minutes_ago = OrderInfo {
        order_status: 1,
        create_time: Utc::now() - ChronoDuration::minutes(10),
    };
    let remaining = engine.get_payment_remaining_time(Some(&ten_minutes_ago));
    assert!((1199..=1201).contains(&remaining));

    let expired = OrderInfo {
        order_status: 1,
        create_time: Utc::now() - ChronoDuration::minutes(31),
    };
    assert_eq!(engine.get_payment_remaining_time(Some(&expired)), 0);

    let paid_order = OrderInfo {
        order_status: 2,
        create_time: Utc::now(),
    };
    assert_eq!(engine.get_payment_remaining_time(Some(&paid_order)), 0);
    assert_eq!(engine.get_payment_remaining_time(None), 0);
}
