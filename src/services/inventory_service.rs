//! Inventory ledger: the authoritative stock count per product.
//!
//! Reads are point-in-time with no reservation. The only write that commits
//! stock against a purchase is [`decrement_if_available`], which is a single
//! conditional `UPDATE` so concurrent buyers can never drive stock negative.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    dto::inventory::{InventoryAdjustRequest, LowStockQuery, NewProduct, ProductList},
    entity::products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Current catalog and stock data for one product.
pub async fn get_available<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<Product> {
    Products::find_by_id(product_id)
        .one(conn)
        .await?
        .map(product_from_entity)
        .ok_or(AppError::NotFound("Product"))
}

/// Fail with `InsufficientStock` unless `requested` units are available right now.
pub fn ensure_available(product: &Product, requested: i32) -> AppResult<()> {
    if requested > product.stock {
        return Err(AppError::InsufficientStock {
            product_id: product.id,
            name: product.name.clone(),
            requested,
            available: product.stock.max(0),
        });
    }
    Ok(())
}

/// Atomically take `qty` units out of stock, or fail if fewer remain.
pub async fn decrement_if_available<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    qty: i32,
) -> AppResult<()> {
    if qty < 1 {
        return Err(AppError::InvalidQuantity);
    }

    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(qty))
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::Stock.gte(qty))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        // distinguish a missing product from an exhausted one
        let product = get_available(conn, product_id).await?;
        return Err(AppError::InsufficientStock {
            product_id,
            name: product.name,
            requested: qty,
            available: product.stock.max(0),
        });
    }

    tracing::debug!(%product_id, qty, "stock decremented");
    Ok(())
}

pub async fn register_product<C: ConnectionTrait>(conn: &C, payload: NewProduct) -> AppResult<Product> {
    if payload.price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        image: Set(payload.image),
        price: Set(payload.price),
        stock: Set(payload.stock),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;

    Ok(product_from_entity(product))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let new_stock = product
        .stock
        .checked_add(payload.delta)
        .ok_or_else(|| AppError::BadRequest("stock out of range".into()))?;
    if new_stock < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }

    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(product_id = %updated.id, delta = payload.delta, stock = updated.stock, "inventory adjusted");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        product_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        image: model.image,
        price: model.price,
        stock: model.stock,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Terracotta Vase".into(),
            image: None,
            price: 10_000,
            stock,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn requesting_more_than_stock_is_rejected() {
        for (stock, requested) in [(0, 1), (1, 2), (5, 6), (3, 100)] {
            let err = ensure_available(&product(stock), requested).unwrap_err();
            assert!(
                matches!(err, AppError::InsufficientStock { available, .. } if available == stock),
                "stock {stock} requested {requested}"
            );
        }
    }

    #[test]
    fn requesting_exact_stock_is_allowed() {
        assert!(ensure_available(&product(4), 4).is_ok());
    }
}
