#![allow(dead_code)]

use async_trait::async_trait;
use campus_pay_engine::config::{EngineConfig, PollingConfig};
use campus_pay_engine::payments::{
    BalancePayResponse, GatewayError, GatewayResult, PasswordVerification, PaymentGateway,
    PaymentMethod, PaymentMethodInfo, PaymentReceipt, PaymentRequest, RawPaymentStatus,
};
use campus_pay_engine::security::{
    AdvisorResult, DeviceInfo, RiskAssessment, RiskLevel, SecurityAdvisor, SignatureParams,
};
use campus_pay_engine::PaymentEngine;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Gateway double with call counters and scripted responses.
pub struct MockGateway {
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub created: Mutex<Vec<PaymentRequest>>,
    pub methods: Vec<PaymentMethodInfo>,
    pub status: Mutex<GatewayResult<RawPaymentStatus>>,
    pub create_result: Mutex<GatewayResult<PaymentReceipt>>,
    pub balance_result: Mutex<GatewayResult<BalancePayResponse>>,
    pub user_balance: Mutex<Decimal>,
    pub password_accepted: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            methods: vec![
                method_info(PaymentMethod::WechatPay, None),
                method_info(PaymentMethod::Alipay, Some(vec!["TAKEOUT"])),
                method_info(PaymentMethod::Balance, None),
            ],
            status: Mutex::new(Ok(RawPaymentStatus::default())),
            create_result: Mutex::new(Ok(json!({"prepayId": "wx-1"}))),
            balance_result: Mutex::new(Ok(BalancePayResponse {
                success: true,
                message: None,
                extra: Default::default(),
            })),
            user_balance: Mutex::new(Decimal::from(100)),
            password_accepted: true,
        }
    }

    pub fn set_status(&self, status: GatewayResult<RawPaymentStatus>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

pub fn method_info(code: PaymentMethod, order_types: Option<Vec<&str>>) -> PaymentMethodInfo {
    PaymentMethodInfo {
        name: code.to_string(),
        code,
        supported_order_types: order_types.map(|t| t.into_iter().map(String::from).collect()),
    }
}

pub fn paid() -> RawPaymentStatus {
    RawPaymentStatus {
        paid: Some(true),
        ..Default::default()
    }
}

pub fn failed(message: &str) -> RawPaymentStatus {
    RawPaymentStatus {
        status: Some("FAILED".to_string()),
        message: Some(message.to_string()),
        ..Default::default()
    }
}

pub fn network_error() -> GatewayError {
    GatewayError::Network {
        message: "connection reset".to_string(),
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn get_payment_methods(
        &self,
        _order_type: Option<&str>,
    ) -> GatewayResult<Vec<PaymentMethodInfo>> {
        Ok(self.methods.clone())
    }

    async fn create_payment(&self, request: PaymentRequest) -> GatewayResult<PaymentReceipt> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(request);
        self.create_result.lock().unwrap().clone()
    }

    async fn get_payment_status(&self, _order_id: &str) -> GatewayResult<RawPaymentStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status.lock().unwrap().clone()
    }

    async fn balance_pay(&self, _request: PaymentRequest) -> GatewayResult<BalancePayResponse> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance_result.lock().unwrap().clone()
    }

    async fn get_user_balance(&self) -> GatewayResult<Decimal> {
        Ok(*self.user_balance.lock().unwrap())
    }

    async fn verify_payment_password(&self, _request: PasswordVerification) -> GatewayResult<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.password_accepted)
    }
}

/// Advisor double returning a fixed environment verdict and risk level.
pub struct MockAdvisor {
    pub secure: bool,
    pub level: RiskLevel,
    pub message: Option<String>,
    pub assessments: AtomicUsize,
}

impl MockAdvisor {
    pub fn new(secure: bool, level: RiskLevel) -> Self {
        Self {
            secure,
            level,
            message: None,
            assessments: AtomicUsize::new(0),
        }
    }

    pub fn assessment_calls(&self) -> usize {
        self.assessments.load(Ordering::SeqCst)
    }
}

impl SecurityAdvisor for MockAdvisor {
    fn check_environment(&self) -> AdvisorResult<bool> {
        Ok(self.secure)
    }

    fn collect_device_info(&self) -> AdvisorResult<DeviceInfo> {
        Ok(DeviceInfo {
            platform: "test".to_string(),
            ..Default::default()
        })
    }

    fn encrypt_device_info(&self, info: &DeviceInfo) -> AdvisorResult<String> {
        Ok(format!("sealed:{}", info.platform))
    }

    fn perform_risk_assessment(&self, _request: &PaymentRequest) -> AdvisorResult<RiskAssessment> {
        self.assessments.fetch_add(1, Ordering::SeqCst);
        Ok(RiskAssessment {
            level: self.level,
            advice: Vec::new(),
            message: self.message.clone(),
        })
    }

    fn encrypt_password(&self, password: &str) -> AdvisorResult<String> {
        Ok(format!("enc:{}", password))
    }

    fn generate_signature(&self, params: &SignatureParams) -> AdvisorResult<String> {
        Ok(format!("{}:{}", params.order_id, params.timestamp))
    }

    fn secure_payment_data(&self, request: PaymentRequest) -> AdvisorResult<PaymentRequest> {
        Ok(request)
    }
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        polling: PollingConfig {
            interval: Duration::from_millis(2),
            max_retries: 30,
        },
        ..EngineConfig::default()
    }
}

pub fn engine_with(
    gateway: Arc<MockGateway>,
    advisor: Arc<MockAdvisor>,
    config: EngineConfig,
) -> Arc<PaymentEngine> {
    Arc::new(PaymentEngine::new(gateway, advisor, config))
}
