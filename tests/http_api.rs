mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    routing::get,
};
use serde::de::DeserializeOwned;
use storefront_checkout::{
    middleware::auth::{ADMIN_ROLE, issue_token},
    models::{Cart, Order},
    response::ApiResponse,
    routes::{create_api_router, health},
    state::AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

use common::{JWT_SECRET, KEY_ID, product};

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .with_state(state)
}

fn bearer(user_id: Uuid, role: &str) -> String {
    let token = issue_token(JWT_SECRET, user_id, role, chrono::Duration::hours(1))
        .expect("issue token");
    format!("Bearer {token}")
}

fn json_request(method: &str, uri: &str, auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn empty_request(method: &str, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).expect("request")
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> anyhow::Result<T> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn health_is_public() -> anyhow::Result<()> {
    let state = common::state().await?;
    let response = app(state).oneshot(empty_request("GET", "/health", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cart_requires_a_bearer_token() -> anyhow::Result<()> {
    let state = common::state().await?;

    let response = app(state.clone())
        .oneshot(empty_request("GET", "/api/cart", None))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = read_json(response).await?;
    assert_eq!(body["data"]["code"], "unauthorized");

    let response = app(state)
        .oneshot(empty_request("GET", "/api/cart", Some("Bearer not-a-jwt")))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn cart_and_checkout_over_http() -> anyhow::Result<()> {
    let state = common::state().await?;
    let vase = product(&state, "Terracotta Vase", 10_000, 5).await?;
    let auth = bearer(Uuid::new_v4(), "user");

    let response = app(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/cart",
            Some(&auth),
            serde_json::json!({ "productId": vase.id, "qty": 2 }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cart: ApiResponse<Cart> = read_json(response).await?;
    assert_eq!(cart.data.map(|cart| cart.total_price), Some(20_000));

    let response = app(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/orders",
            Some(&auth),
            serde_json::json!({
                "shippingAddress": {
                    "address": "12 Market Road",
                    "city": "Pune",
                    "postalCode": "411001",
                    "country": "IN"
                },
                "paymentMethod": "Razorpay"
            }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: ApiResponse<Order> = read_json(response).await?;
    let order = order.data.expect("order");
    assert_eq!(order.total_price, 28_600);

    let response = app(state.clone())
        .oneshot(empty_request("GET", &format!("/api/orders/{}", order.id), Some(&auth)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let stranger = bearer(Uuid::new_v4(), "user");
    let response = app(state.clone())
        .oneshot(empty_request("GET", &format!("/api/orders/{}", order.id), Some(&stranger)))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(state)
        .oneshot(empty_request("GET", "/api/cart", Some(&auth)))
        .await?;
    let cart: ApiResponse<Cart> = read_json(response).await?;
    assert!(cart.data.map(|cart| cart.lines.is_empty()).unwrap_or(false));
    Ok(())
}

#[tokio::test]
async fn domain_errors_use_the_envelope() -> anyhow::Result<()> {
    let state = common::state().await?;
    let vase = product(&state, "Terracotta Vase", 10_000, 1).await?;
    let auth = bearer(Uuid::new_v4(), "user");

    let response = app(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/cart",
            Some(&auth),
            serde_json::json!({ "productId": vase.id, "qty": 4 }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = read_json(response).await?;
    assert_eq!(body["data"]["code"], "insufficient_stock");

    let response = app(state)
        .oneshot(json_request(
            "POST",
            "/api/orders",
            Some(&auth),
            serde_json::json!({
                "orderItems": [],
                "shippingAddress": {
                    "address": "12 Market Road",
                    "city": "Pune",
                    "postalCode": "411001",
                    "country": "IN"
                },
                "paymentMethod": "Razorpay"
            }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = read_json(response).await?;
    assert_eq!(body["data"]["code"], "empty_order");
    Ok(())
}

#[tokio::test]
async fn gateway_key_is_public() -> anyhow::Result<()> {
    let state = common::state().await?;
    let response = app(state)
        .oneshot(empty_request("GET", "/api/orders/config/razorpay", None))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = read_json(response).await?;
    assert_eq!(body["data"]["key_id"], KEY_ID);
    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_customers() -> anyhow::Result<()> {
    let state = common::state().await?;
    product(&state, "Ceramic Tea Set", 21_000, 2).await?;

    let response = app(state.clone())
        .oneshot(empty_request(
            "GET",
            "/api/admin/inventory/low-stock?threshold=3",
            Some(&bearer(Uuid::new_v4(), "user")),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(state)
        .oneshot(empty_request(
            "GET",
            "/api/admin/inventory/low-stock?threshold=3&page=1",
            Some(&bearer(Uuid::new_v4(), ADMIN_ROLE)),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = read_json(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["meta"]["total"], 1);
    Ok(())
}
