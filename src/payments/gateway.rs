use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected payment gateway response: {0}")]
    UnexpectedResponse(String),
}

impl GatewayError {
    /// Errors worth retrying for a call that only creates remote state.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
            GatewayError::UnexpectedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOrderRequest {
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    /// Local order id, echoed back by the gateway in payment notes.
    pub order_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
}

/// Remote payment processor that mints order records for the client payment UI.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: GatewayOrderRequest)
    -> Result<GatewayOrder, GatewayError>;

    /// Public key id handed to the client payment widget.
    fn key_id(&self) -> String;
}
