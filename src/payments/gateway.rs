use crate::payments::error::GatewayResult;
use crate::payments::types::{
    BalancePayResponse, PasswordVerification, PaymentMethodInfo, PaymentReceipt, PaymentRequest,
    RawPaymentStatus,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Network calls to the payment API. Implementations own transport concerns
/// (timeouts, retries, authentication); the engine treats every call as an
/// opaque await point.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn get_payment_methods(
        &self,
        order_type: Option<&str>,
    ) -> GatewayResult<Vec<PaymentMethodInfo>>;

    async fn create_payment(&self, request: PaymentRequest) -> GatewayResult<PaymentReceipt>;

    async fn get_payment_status(&self, order_id: &str) -> GatewayResult<RawPaymentStatus>;

    async fn balance_pay(&self, request: PaymentRequest) -> GatewayResult<BalancePayResponse>;

    async fn get_user_balance(&self) -> GatewayResult<Decimal>;

    async fn verify_payment_password(&self, request: PasswordVerification) -> GatewayResult<bool>;
}
