use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::PaymentResult;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateGatewayOrderRequest {
    /// Amount in minor units; must equal the order total when given.
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GatewayOrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub key_id: String,
}

/// Result reported by the client after the gateway checkout widget succeeds.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PayOrderRequest {
    /// Gateway payment id.
    pub id: String,
    pub status: String,
    pub update_time: Option<String>,
    pub email_address: Option<String>,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

impl From<PayOrderRequest> for PaymentResult {
    fn from(req: PayOrderRequest) -> Self {
        PaymentResult {
            external_payment_id: req.id,
            status: req.status,
            update_time: req.update_time,
            email_address: req.email_address,
            external_order_id: req.razorpay_order_id,
            signature: req.razorpay_signature,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GatewayKeyResponse {
    pub key_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub event: String,
    pub handled: bool,
}
