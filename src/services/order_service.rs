//! Order ledger.
//!
//! Orders are immutable after creation except for the paid and delivered
//! flags, each of which moves from false to true at most once.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::OrderList,
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, PaymentResult, ShippingAddress},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{checkout_service::CheckoutSession, inventory_service},
    state::AppState,
};

/// Persist a new order from a checkout session.
///
/// Prices come from the catalog at this moment, not from the session, and
/// every line's stock is taken with a conditional decrement inside the same
/// transaction. The cart is left untouched; clearing it is the caller's job.
pub async fn create_order(
    state: &AppState,
    owner_id: Uuid,
    session: &CheckoutSession,
) -> AppResult<Order> {
    session.validate()?;
    let lines = session.merged_lines();

    let txn = state.orm.begin().await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (product_id, qty) in lines {
        let product = inventory_service::get_available(&txn, product_id).await?;
        inventory_service::decrement_if_available(&txn, product_id, qty).await?;
        items.push(OrderItem {
            product_id,
            name: product.name,
            image: product.image,
            price: product.price,
            qty,
        });
    }

    let items_price = pricing::items_price(items.iter().map(|item| (item.qty, item.price)));
    let totals = state.config.pricing.totals(items_price);
    if let Some(client_total) = session.client_total_price {
        if client_total != totals.total_price {
            tracing::warn!(
                %owner_id,
                client_total,
                server_total = totals.total_price,
                "client-submitted total ignored"
            );
        }
    }

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        owner_id: Set(owner_id),
        shipping_address: Set(session.shipping_address.address.trim().to_owned()),
        shipping_city: Set(session.shipping_address.city.trim().to_owned()),
        shipping_postal_code: Set(session.shipping_address.postal_code.trim().to_owned()),
        shipping_country: Set(session.shipping_address.country.trim().to_owned()),
        payment_method: Set(session.payment_method.trim().to_owned()),
        items_price: Set(totals.items_price),
        shipping_price: Set(totals.shipping_price),
        tax_price: Set(totals.tax_price),
        total_price: Set(totals.total_price),
        is_paid: Set(false),
        paid_at: Set(None),
        payment_id: Set(None),
        payment_status: Set(None),
        payment_update_time: Set(None),
        payment_email: Set(None),
        gateway_order_id: Set(None),
        gateway_signature: Set(None),
        is_delivered: Set(false),
        delivered_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut rows = Vec::with_capacity(items.len());
    for item in &items {
        let row = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            name: Set(item.name.clone()),
            image: Set(item.image.clone()),
            quantity: Set(item.qty),
            price: Set(item.price),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        rows.push(row);
    }

    txn.commit().await?;

    tracing::info!(%owner_id, order_id = %order.id, total_price = order.total_price, "order created");
    audit::record(
        &state.orm,
        Some(owner_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(order_from_entity(order, rows))
}

/// Fetch an order visible to `requester` (its owner or any admin).
pub async fn get_order(state: &AppState, requester: &AuthUser, id: Uuid) -> AppResult<Order> {
    let order = find_order(&state.orm, id).await?;
    if !requester.can_access(order.owner_id) {
        tracing::warn!(order_id = %id, requester = %requester.user_id, "order access denied");
        return Err(AppError::Forbidden);
    }
    Ok(order)
}

pub async fn list_mine(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::OwnerId.eq(user.user_id));
    list_orders(state, condition, query).await
}

pub async fn list_all(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_orders(state, Condition::all(), query).await
}

async fn list_orders(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(is_paid) = query.is_paid {
        condition = condition.add(OrderCol::IsPaid.eq(is_paid));
    }
    if let Some(is_delivered) = query.is_delivered {
        condition = condition.add(OrderCol::IsDelivered.eq(is_delivered));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let mut items_by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    if !ids.is_empty() {
        for item in OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(ids))
            .order_by_asc(OrderItemCol::CreatedAt)
            .all(&state.orm)
            .await?
        {
            items_by_order.entry(item.order_id).or_default().push(item);
        }
    }

    let items = orders
        .into_iter()
        .map(|order| {
            let rows = items_by_order.remove(&order.id).unwrap_or_default();
            order_from_entity(order, rows)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

/// Record a settled payment.
///
/// The first call flips `is_paid`. Replaying the same external payment id is
/// a no-op that returns the order unchanged; a different payment id against a
/// paid order fails with `AlreadyPaid`. One external payment may settle only
/// one order.
pub async fn mark_paid(
    state: &AppState,
    order_id: Uuid,
    result: PaymentResult,
) -> AppResult<Order> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if order.is_paid {
        if order.payment_id.as_deref() == Some(result.external_payment_id.as_str()) {
            tracing::info!(%order_id, payment_id = %result.external_payment_id, "duplicate payment notification ignored");
            let items = load_items(&txn, order.id).await?;
            txn.commit().await?;
            return Ok(order_from_entity(order, items));
        }
        return Err(AppError::AlreadyPaid);
    }

    let settled_elsewhere = Orders::find()
        .filter(OrderCol::PaymentId.eq(result.external_payment_id.clone()))
        .filter(OrderCol::Id.ne(order_id))
        .one(&txn)
        .await?;
    if let Some(other) = settled_elsewhere {
        tracing::warn!(%order_id, other_order_id = %other.id, "payment id already settled another order");
        return Err(AppError::Conflict("payment already recorded for another order".into()));
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.is_paid = Set(true);
    active.paid_at = Set(Some(now.into()));
    active.payment_id = Set(Some(result.external_payment_id.clone()));
    active.payment_status = Set(Some(result.status.clone()));
    active.payment_update_time = Set(result.update_time.clone());
    active.payment_email = Set(result.email_address.clone());
    active.gateway_order_id = Set(Some(result.external_order_id.clone()));
    active.gateway_signature = Set(Some(result.signature.clone()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await.map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("payment already recorded for another order".into())
        }
        _ => err.into(),
    })?;

    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    tracing::info!(%order_id, payment_id = %result.external_payment_id, "order paid");
    audit::record(
        &state.orm,
        Some(order.owner_id),
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id, "payment_id": result.external_payment_id }),
    )
    .await;

    Ok(order_from_entity(order, items))
}

/// Flag an order as delivered. Repeats leave the first `delivered_at` in place.
pub async fn mark_delivered(state: &AppState, user: &AuthUser, order_id: Uuid) -> AppResult<Order> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if order.is_delivered {
        let items = load_items(&txn, order.id).await?;
        txn.commit().await?;
        return Ok(order_from_entity(order, items));
    }

    if state.config.require_payment_before_delivery && !order.is_paid {
        return Err(AppError::NotPaid);
    }
    if !order.is_paid {
        tracing::warn!(%order_id, "delivering an unpaid order");
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.is_delivered = Set(true);
    active.delivered_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_delivered",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(order_from_entity(order, items))
}

pub(crate) async fn find_order<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Order> {
    let order = Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let items = load_items(conn, order.id).await?;
    Ok(order_from_entity(order, items))
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItemModel>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?)
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItemModel>) -> Order {
    let payment_result = match (&model.payment_id, &model.gateway_order_id) {
        (Some(payment_id), Some(gateway_order_id)) => Some(PaymentResult {
            external_payment_id: payment_id.clone(),
            status: model.payment_status.clone().unwrap_or_default(),
            update_time: model.payment_update_time.clone(),
            email_address: model.payment_email.clone(),
            external_order_id: gateway_order_id.clone(),
            signature: model.gateway_signature.clone().unwrap_or_default(),
        }),
        _ => None,
    };

    Order {
        id: model.id,
        owner_id: model.owner_id,
        order_items: items.into_iter().map(order_item_from_entity).collect(),
        shipping_address: ShippingAddress {
            address: model.shipping_address,
            city: model.shipping_city,
            postal_code: model.shipping_postal_code,
            country: model.shipping_country,
        },
        payment_method: model.payment_method,
        items_price: model.items_price,
        shipping_price: model.shipping_price,
        tax_price: model.tax_price,
        total_price: model.total_price,
        is_paid: model.is_paid,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        payment_result,
        is_delivered: model.is_delivered,
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        product_id: model.product_id,
        name: model.name,
        image: model.image,
        price: model.price,
        qty: model.quantity,
    }
}
