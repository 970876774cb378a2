//! Payment reconciliation against the external gateway.

use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, SqlErr};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    dto::payments::{
        CreateGatewayOrderRequest, GatewayKeyResponse, GatewayOrderResponse, PayOrderRequest,
        WebhookAck,
    },
    entity::gateway_orders::{ActiveModel as GatewayOrderActive, Entity as GatewayOrders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, PaymentResult},
    payments::{GatewayError, GatewayOrder, GatewayOrderRequest, signature},
    services::order_service,
    state::AppState,
};

const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(200);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

/// Header carrying the webhook body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Mint a gateway order for the order's total so the client can pay it.
///
/// The minted id is remembered against the order so a later payment report
/// can only settle the order it was created for. The order itself does not
/// change. Transient gateway failures are retried; each attempt is bounded
/// by the configured gateway timeout.
pub async fn create_external_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: CreateGatewayOrderRequest,
) -> AppResult<GatewayOrderResponse> {
    let order = order_service::find_order(&state.orm, order_id).await?;
    if !user.can_access(order.owner_id) {
        return Err(AppError::Forbidden);
    }
    if order.is_paid {
        return Err(AppError::AlreadyPaid);
    }
    if let Some(amount) = payload.amount {
        if amount != order.total_price {
            return Err(AppError::BadRequest(format!(
                "amount {amount} does not match order total {}",
                order.total_price
            )));
        }
    }

    let request = GatewayOrderRequest {
        amount: order.total_price,
        currency: state.config.gateway.currency.clone(),
        receipt: format!("receipt_order_{}", order.id),
        order_id: order.id,
    };
    let created = create_with_retry(state, request).await?;
    if created.amount != order.total_price {
        tracing::error!(%order_id, gateway_order_id = %created.id, amount = created.amount, "gateway order amount differs from order total");
        return Err(AppError::ExternalService(format!(
            "gateway order {} was created for {} instead of {}",
            created.id, created.amount, order.total_price
        )));
    }
    remember_gateway_order(&state.orm, &order, &created).await?;

    tracing::info!(%order_id, gateway_order_id = %created.id, amount = created.amount, "gateway order created");

    Ok(GatewayOrderResponse {
        id: created.id,
        amount: created.amount,
        currency: created.currency,
        receipt: created.receipt,
        key_id: state.gateway.key_id(),
    })
}

async fn remember_gateway_order<C: ConnectionTrait>(
    conn: &C,
    order: &Order,
    created: &GatewayOrder,
) -> AppResult<()> {
    let inserted = GatewayOrderActive {
        id: Set(created.id.clone()),
        order_id: Set(order.id),
        amount: Set(created.amount),
        currency: Set(created.currency.clone()),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(_) => Ok(()),
        // the gateway handed back an id it already gave us
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            ensure_minted_for(conn, order, &created.id)
                .await
                .map_err(|_| AppError::ExternalService(format!("gateway order {} reused", created.id)))
        }
        Err(err) => Err(err.into()),
    }
}

/// The gateway order must have been minted here for `order` and its total.
async fn ensure_minted_for<C: ConnectionTrait>(
    conn: &C,
    order: &Order,
    gateway_order_id: &str,
) -> AppResult<()> {
    let minted = GatewayOrders::find_by_id(gateway_order_id.to_owned())
        .one(conn)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("unknown gateway order {gateway_order_id}")))?;

    if minted.order_id != order.id {
        tracing::warn!(order_id = %order.id, minted_for = %minted.order_id, gateway_order_id, "gateway order belongs to another order");
        return Err(AppError::BadRequest(format!(
            "gateway order {gateway_order_id} does not belong to this order"
        )));
    }
    if minted.amount != order.total_price {
        tracing::warn!(order_id = %order.id, gateway_order_id, amount = minted.amount, "gateway order amount differs from order total");
        return Err(AppError::BadRequest(format!(
            "gateway order {gateway_order_id} amount {} does not match order total {}",
            minted.amount, order.total_price
        )));
    }
    Ok(())
}

async fn create_with_retry(
    state: &AppState,
    request: GatewayOrderRequest,
) -> Result<GatewayOrder, GatewayError> {
    let gateway = &state.config.gateway;
    let max_attempts = gateway.max_attempts.max(1);
    let mut delay = RETRY_INITIAL_DELAY;

    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(
            gateway.timeout,
            state.gateway.create_order(request.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };

        match result {
            Ok(order) => return Ok(order),
            Err(err) if attempt < max_attempts && err.is_transient() => {
                tracing::warn!(attempt, error = %err, "gateway order creation failed, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RETRY_MAX_DELAY);
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(attempt, error = %err, "gateway order creation failed");
                return Err(err);
            }
        }
    }
}

/// Record the payment the client reports after the checkout widget succeeds.
///
/// The signature over `"<gateway order id>|<payment id>"` must verify and the
/// gateway order must be one minted for this order before anything is written.
pub async fn record_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: PayOrderRequest,
) -> AppResult<Order> {
    let order = order_service::find_order(&state.orm, order_id).await?;
    if !user.can_access(order.owner_id) {
        return Err(AppError::Forbidden);
    }

    if !signature::verify_checkout(
        &state.config.gateway.key_secret,
        &payload.razorpay_order_id,
        &payload.id,
        &payload.razorpay_signature,
    ) {
        tracing::warn!(%order_id, payment_id = %payload.id, "checkout signature rejected");
        return Err(AppError::InvalidSignature);
    }
    ensure_minted_for(&state.orm, &order, &payload.razorpay_order_id).await?;

    order_service::mark_paid(state, order_id, PaymentResult::from(payload)).await
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    payment: Option<EntityEnvelope<PaymentEntity>>,
}

#[derive(Debug, Deserialize)]
struct EntityEnvelope<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    amount: Option<i64>,
    status: Option<String>,
    email: Option<String>,
    created_at: Option<i64>,
    // an empty notes object is serialized as `[]`
    #[serde(default)]
    notes: serde_json::Value,
}

impl PaymentEntity {
    fn local_order_id(&self) -> Option<Uuid> {
        self.notes
            .get("order_id")
            .and_then(|value| value.as_str())
            .and_then(|value| Uuid::parse_str(value).ok())
    }
}

/// Server-to-server payment notification.
///
/// The raw body is authenticated with the webhook secret. Capture events
/// settle the referenced order; every other event is acknowledged unhandled.
pub async fn handle_webhook(
    state: &AppState,
    body: &[u8],
    signature_header: Option<&str>,
) -> AppResult<WebhookAck> {
    let Some(signature_hex) = signature_header else {
        return Err(AppError::InvalidSignature);
    };
    if !signature::verify(&state.config.gateway.webhook_secret, body, signature_hex) {
        tracing::warn!("webhook signature rejected");
        return Err(AppError::InvalidSignature);
    }

    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|err| AppError::BadRequest(format!("invalid webhook body: {err}")))?;

    if !matches!(event.event.as_str(), "payment.captured" | "order.paid") {
        tracing::debug!(event = %event.event, "webhook event ignored");
        return Ok(WebhookAck {
            event: event.event,
            handled: false,
        });
    }

    let payment = event
        .payload
        .payment
        .map(|envelope| envelope.entity)
        .ok_or_else(|| AppError::BadRequest("webhook has no payment entity".into()))?;
    let order_id = payment
        .local_order_id()
        .ok_or_else(|| AppError::BadRequest("payment notes carry no order_id".into()))?;

    let ignored = |reason: &str| {
        tracing::warn!(%order_id, payment_id = %payment.id, reason, "webhook payment not applied");
        WebhookAck {
            event: event.event.clone(),
            handled: false,
        }
    };

    let order = order_service::find_order(&state.orm, order_id).await?;
    let Some(gateway_order_id) = payment.order_id.clone() else {
        return Ok(ignored("payment carries no gateway order"));
    };
    match ensure_minted_for(&state.orm, &order, &gateway_order_id).await {
        Ok(()) => {}
        Err(AppError::BadRequest(_)) => {
            return Ok(ignored("gateway order not minted for this order"));
        }
        Err(err) => return Err(err),
    }
    if payment.amount.is_some_and(|amount| amount != order.total_price) {
        return Ok(ignored("captured amount differs from order total"));
    }

    let result = PaymentResult {
        external_payment_id: payment.id.clone(),
        status: payment.status.clone().unwrap_or_else(|| "captured".into()),
        update_time: payment.created_at.map(|ts| ts.to_string()),
        email_address: payment.email.clone(),
        external_order_id: gateway_order_id,
        signature: signature_hex.to_owned(),
    };

    // redelivery stops once the event is acknowledged, applied or not
    match order_service::mark_paid(state, order_id, result).await {
        Ok(_) => Ok(WebhookAck {
            event: event.event.clone(),
            handled: true,
        }),
        Err(AppError::AlreadyPaid) => Ok(ignored("order paid by another payment")),
        Err(AppError::Conflict(_)) => Ok(ignored("payment already settled another order")),
        Err(err) => Err(err),
    }
}

pub fn gateway_key(state: &AppState) -> GatewayKeyResponse {
    GatewayKeyResponse {
        key_id: state.gateway.key_id(),
    }
}
