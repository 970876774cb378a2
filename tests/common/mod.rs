#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use storefront_checkout::{
    config::{AppConfig, CartMergePolicy, GatewayConfig},
    db::create_memory_conn,
    dto::{
        inventory::NewProduct,
        orders::{CheckoutLine, CreateOrderRequest},
        payments::{CreateGatewayOrderRequest, PayOrderRequest},
    },
    middleware::auth::{ADMIN_ROLE, AuthUser},
    models::{Product, ShippingAddress},
    payments::{GatewayOrder, MockPaymentGateway, PaymentGateway, signature},
    pricing::PricingPolicy,
    services::{inventory_service, payment_service},
    state::AppState,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const KEY_ID: &str = "rzp_test_key";
pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: JWT_SECRET.into(),
        db_acquire_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(30),
        gateway: GatewayConfig {
            key_id: KEY_ID.into(),
            key_secret: KEY_SECRET.into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            api_base: "http://127.0.0.1:9".into(),
            currency: "INR".into(),
            timeout: Duration::from_millis(200),
            max_attempts: 2,
        },
        pricing: PricingPolicy::default(),
        cart_merge_policy: CartMergePolicy::Replace,
        require_payment_before_delivery: false,
    }
}

/// Gateway mock that only answers `key_id`; tests add their own expectations.
pub fn mock_gateway() -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_key_id().return_const(KEY_ID.to_string());
    gateway
}

pub async fn state_with(
    gateway: Arc<dyn PaymentGateway>,
    tweak: impl FnOnce(&mut AppConfig),
) -> anyhow::Result<AppState> {
    let mut config = test_config();
    tweak(&mut config);
    let orm = create_memory_conn().await?;
    Ok(AppState::new(orm, config, gateway))
}

/// Gateway mock that also mints one gateway order per call, named after the
/// local order.
pub fn minting_gateway() -> MockPaymentGateway {
    let mut gateway = mock_gateway();
    gateway.expect_create_order().returning(|request| {
        Ok(gateway_order(
            &format!("order_gw_{}", request.order_id.simple()),
            request.amount,
        ))
    });
    gateway
}

pub async fn state() -> anyhow::Result<AppState> {
    state_with(Arc::new(minting_gateway()), |_| {}).await
}

/// Mint a gateway order for `order_id` the way the client does before paying.
pub async fn mint(state: &AppState, user: &AuthUser, order_id: Uuid) -> anyhow::Result<String> {
    let created = payment_service::create_external_order(
        state,
        user,
        order_id,
        CreateGatewayOrderRequest::default(),
    )
    .await?;
    Ok(created.id)
}

pub async fn product(state: &AppState, name: &str, price: i64, stock: i32) -> anyhow::Result<Product> {
    Ok(inventory_service::register_product(
        &state.orm,
        NewProduct {
            name: name.into(),
            image: Some(format!("/images/{}.jpg", name.to_lowercase().replace(' ', "-"))),
            price,
            stock,
        },
    )
    .await?)
}

pub fn customer() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.into(),
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        address: "12 Market Road".into(),
        city: "Pune".into(),
        postal_code: "411001".into(),
        country: "IN".into(),
    }
}

pub fn line(product_id: Uuid, qty: i32) -> CheckoutLine {
    CheckoutLine {
        product_id,
        qty,
        name: None,
        image: None,
        price: None,
    }
}

pub fn order_request(lines: Option<Vec<CheckoutLine>>) -> CreateOrderRequest {
    CreateOrderRequest {
        order_items: lines,
        shipping_address: address(),
        payment_method: "Razorpay".into(),
        items_price: None,
        tax_price: None,
        shipping_price: None,
        total_price: None,
    }
}

pub fn gateway_order(id: &str, amount: i64) -> GatewayOrder {
    GatewayOrder {
        id: id.into(),
        amount,
        currency: "INR".into(),
        receipt: None,
    }
}

/// A payment report signed the way the gateway's checkout widget signs it.
pub fn signed_payment(gateway_order_id: &str, payment_id: &str) -> PayOrderRequest {
    let signature = signature::sign(
        KEY_SECRET,
        signature::checkout_payload(gateway_order_id, payment_id).as_bytes(),
    );
    PayOrderRequest {
        id: payment_id.into(),
        status: "captured".into(),
        update_time: Some("2026-10-15T10:00:00Z".into()),
        email_address: Some("buyer@example.com".into()),
        razorpay_order_id: gateway_order_id.into(),
        razorpay_signature: signature,
    }
}
