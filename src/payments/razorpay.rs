use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::{
    config::GatewayConfig,
    payments::gateway::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway},
};

/// Razorpay Orders API client.
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    config: GatewayConfig,
    http: Client,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
    notes: Notes,
}

#[derive(Serialize)]
struct Notes {
    order_id: String,
}

impl RazorpayGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GatewayError::from)?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.config.api_base.trim_end_matches('/'));
        let body = CreateOrderBody {
            amount: request.amount,
            currency: &request.currency,
            receipt: &request.receipt,
            payment_capture: 1,
            notes: Notes {
                order_id: request.order_id.to_string(),
            },
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, body });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;

        if order.amount != request.amount {
            return Err(GatewayError::UnexpectedResponse(format!(
                "gateway echoed amount {} for requested {}",
                order.amount, request.amount
            )));
        }

        Ok(order)
    }

    fn key_id(&self) -> String {
        self.config.key_id.clone()
    }
}
