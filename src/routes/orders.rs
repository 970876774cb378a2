use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{CreateOrderRequest, OrderList},
        payments::{CreateGatewayOrderRequest, GatewayKeyResponse, GatewayOrderResponse, PayOrderRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{checkout_service, order_service, payment_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_all_orders))
        .route("/myorders", get(list_my_orders))
        .route("/config/razorpay", get(gateway_key))
        .route("/{id}", get(get_order))
        .route("/{id}/pay", put(pay_order))
        .route("/{id}/deliver", put(deliver_order))
        .route("/{id}/razorpay", post(create_gateway_order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created and cart cleared", body = ApiResponse<Order>),
        (status = 400, description = "Empty order or invalid input"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(axum::http::StatusCode, Json<ApiResponse<Order>>)> {
    let order = checkout_service::place_order(&state, user.user_id, payload).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success("Order created", order, Some(Meta::empty()))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders/myorders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders of the current user", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_mine(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_all(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<Order>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::get_order(&state, &user, id).await?;
    Ok(Json(ApiResponse::success("OK", order, Some(Meta::empty()))))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/pay",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = PayOrderRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<Order>),
        (status = 400, description = "Invalid signature, or gateway order not minted for this order"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PayOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = payment_service::record_payment(&state, &user, id, payload).await?;
    Ok(Json(ApiResponse::success("Payment recorded", order, Some(Meta::empty()))))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order delivered", body = ApiResponse<Order>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order not paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn deliver_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::mark_delivered(&state, &user, id).await?;
    Ok(Json(ApiResponse::success("Order delivered", order, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/razorpay",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CreateGatewayOrderRequest,
    responses(
        (status = 200, description = "Gateway order created", body = ApiResponse<GatewayOrderResponse>),
        (status = 400, description = "Amount does not match order total"),
        (status = 409, description = "Order already paid"),
        (status = 502, description = "Gateway error"),
        (status = 504, description = "Gateway timed out")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_gateway_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<CreateGatewayOrderRequest>>,
) -> AppResult<Json<ApiResponse<GatewayOrderResponse>>> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let created = payment_service::create_external_order(&state, &user, id, payload).await?;
    Ok(Json(ApiResponse::success("Gateway order created", created, Some(Meta::empty()))))
}

#[utoipa::path(
    get,
    path = "/api/orders/config/razorpay",
    responses(
        (status = 200, description = "Public gateway key", body = ApiResponse<GatewayKeyResponse>)
    ),
    tag = "Payments"
)]
pub async fn gateway_key(State(state): State<AppState>) -> Json<ApiResponse<GatewayKeyResponse>> {
    Json(ApiResponse::success(
        "OK",
        payment_service::gateway_key(&state),
        Some(Meta::empty()),
    ))
}
