use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Payment channel code as exchanged with the payment API.
///
/// Unknown codes are carried through untouched so a backend can introduce a
/// new channel without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    WechatPay,
    Alipay,
    Balance,
    Other(String),
}

impl PaymentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::WechatPay => "WECHAT_PAY",
            PaymentMethod::Alipay => "ALIPAY",
            PaymentMethod::Balance => "BALANCE",
            PaymentMethod::Other(code) => code.as_str(),
        }
    }

    pub fn is_balance(&self) -> bool {
        matches!(self, PaymentMethod::Balance)
    }
}

impl From<&str> for PaymentMethod {
    fn from(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "WECHAT_PAY" | "WECHAT" => PaymentMethod::WechatPay,
            "ALIPAY" => PaymentMethod::Alipay,
            "BALANCE" => PaymentMethod::Balance,
            _ => PaymentMethod::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        PaymentMethod::from(value.as_str())
    }
}

impl From<PaymentMethod> for String {
    fn from(value: PaymentMethod) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the method list returned by the payment API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInfo {
    pub code: PaymentMethod,
    pub name: String,
    /// `None` means every order type is accepted.
    #[serde(default)]
    pub supported_order_types: Option<Vec<String>>,
}

impl PaymentMethodInfo {
    pub fn supports_order_type(&self, order_type: &str) -> bool {
        match &self.supported_order_types {
            Some(types) => types.iter().any(|t| t == order_type),
            None => true,
        }
    }
}

/// Signed metadata attached by the security advisor before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEnvelope {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

impl PaymentRequest {
    pub fn new(order_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
            payment_method: None,
            order_type: None,
            security: None,
            metadata: None,
        }
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn with_order_type(mut self, order_type: impl Into<String>) -> Self {
        self.order_type = Some(order_type.into());
        self
    }
}

/// Opaque body returned by the order-payment endpoint.
pub type PaymentReceipt = JsonValue;

/// Status body as the backend sends it. Either the boolean or the string
/// field may carry the verdict; see [`crate::payments::status::normalize_status`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawPaymentStatus {
    #[serde(default)]
    pub paid: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub failed: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalancePayResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Payload sent to the backend to check a payment password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordVerification {
    pub order_id: String,
    pub encrypted_password: String,
    pub signature: String,
    pub timestamp: i64,
}

/// Order status code for "awaiting payment".
pub const ORDER_AWAITING_PAYMENT: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub order_status: i32,
    pub create_time: DateTime<Utc>,
}
