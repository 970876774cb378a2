//! Cart store.
//!
//! Every mutation runs in one transaction that re-reads current stock,
//! rewrites the affected lines and the cart's derived totals together, and
//! bumps the cart `version` with a compare-and-swap. A writer that loses the
//! race is retried from scratch a bounded number of times.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit,
    config::CartMergePolicy,
    db::OrmConn,
    entity::{
        cart_lines::{ActiveModel as LineActive, Column as LineCol, Entity as CartLines, Model as LineModel},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    models::{Cart, CartLine, Product},
    pricing,
    services::inventory_service,
    state::AppState,
};

const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy)]
enum CartMutation {
    Add {
        product_id: Uuid,
        qty: i32,
        policy: CartMergePolicy,
    },
    SetQuantity {
        product_id: Uuid,
        qty: i32,
    },
    Remove {
        product_id: Uuid,
    },
    Clear,
}

impl CartMutation {
    fn product_id(&self) -> Option<Uuid> {
        match self {
            CartMutation::Add { product_id, .. }
            | CartMutation::SetQuantity { product_id, .. }
            | CartMutation::Remove { product_id } => Some(*product_id),
            CartMutation::Clear => None,
        }
    }

    fn needs_stock(&self) -> bool {
        matches!(
            self,
            CartMutation::Add { .. } | CartMutation::SetQuantity { .. }
        )
    }

    fn audit_action(&self) -> &'static str {
        match self {
            CartMutation::Add { .. } => "cart_add",
            CartMutation::SetQuantity { .. } => "cart_set_quantity",
            CartMutation::Remove { .. } => "cart_remove",
            CartMutation::Clear => "cart_clear",
        }
    }
}

pub async fn get_cart<C: ConnectionTrait>(conn: &C, owner_id: Uuid) -> AppResult<Cart> {
    let Some(cart) = Carts::find()
        .filter(CartCol::OwnerId.eq(owner_id))
        .one(conn)
        .await?
    else {
        return Ok(Cart::empty(owner_id));
    };

    let lines = load_lines(conn, cart.id).await?;
    Ok(cart_from_rows(&cart, &lines))
}

pub async fn add_item(
    state: &AppState,
    owner_id: Uuid,
    product_id: Uuid,
    qty: i32,
) -> AppResult<Cart> {
    let mutation = CartMutation::Add {
        product_id,
        qty,
        policy: state.config.cart_merge_policy,
    };
    run(state, owner_id, mutation).await
}

pub async fn set_item_quantity(
    state: &AppState,
    owner_id: Uuid,
    product_id: Uuid,
    qty: i32,
) -> AppResult<Cart> {
    run(state, owner_id, CartMutation::SetQuantity { product_id, qty }).await
}

pub async fn remove_item(state: &AppState, owner_id: Uuid, product_id: Uuid) -> AppResult<Cart> {
    run(state, owner_id, CartMutation::Remove { product_id }).await
}

/// Empty the cart. Succeeds on a missing or already-empty cart.
pub async fn clear(state: &AppState, owner_id: Uuid) -> AppResult<Cart> {
    run(state, owner_id, CartMutation::Clear).await
}

async fn run(state: &AppState, owner_id: Uuid, mutation: CartMutation) -> AppResult<Cart> {
    let cart = write_with_retry(&state.orm, owner_id, mutation).await?;

    let mut metadata = serde_json::json!({
        "total_items": cart.total_items,
        "total_price": cart.total_price,
        "version": cart.version,
    });
    if let Some(product_id) = mutation.product_id() {
        metadata["product_id"] = serde_json::json!(product_id);
    }
    audit::record(
        &state.orm,
        Some(owner_id),
        mutation.audit_action(),
        "carts",
        metadata,
    )
    .await;

    Ok(cart)
}

async fn write_with_retry(conn: &OrmConn, owner_id: Uuid, mutation: CartMutation) -> AppResult<Cart> {
    retry_on_conflict(owner_id, || try_write(conn, owner_id, mutation)).await
}

/// Re-run `write` from scratch while it loses version races, at most
/// `MAX_WRITE_ATTEMPTS` times in total.
async fn retry_on_conflict<F, Fut>(owner_id: Uuid, mut write: F) -> AppResult<Cart>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Cart>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Err(AppError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                tracing::debug!(%owner_id, attempt, %reason, "cart write lost a race, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

async fn try_write(conn: &OrmConn, owner_id: Uuid, mutation: CartMutation) -> AppResult<Cart> {
    if let CartMutation::Add { qty, .. } | CartMutation::SetQuantity { qty, .. } = mutation {
        if qty < 1 {
            return Err(AppError::InvalidQuantity);
        }
    }

    let txn = conn.begin().await?;

    let existing = Carts::find()
        .filter(CartCol::OwnerId.eq(owner_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let stored = match &existing {
        Some(cart) => load_lines(&txn, cart.id).await?,
        None => Vec::new(),
    };

    if existing.is_none() {
        match mutation {
            CartMutation::Clear => return Ok(Cart::empty(owner_id)),
            CartMutation::Remove { .. } => return Err(AppError::NotInCart),
            _ => {}
        }
    }

    // stock is re-read inside the transaction, never taken from the line cache
    let product = match mutation.product_id().filter(|_| mutation.needs_stock()) {
        Some(product_id) => Some(inventory_service::get_available(&txn, product_id).await?),
        None => None,
    };

    let mut lines: Vec<CartLine> = stored.iter().map(line_from_entity).collect();
    apply(&mut lines, mutation, product.as_ref())?;

    let total_items: i64 = lines.iter().map(|line| i64::from(line.quantity)).sum();
    let total_price = pricing::items_price(lines.iter().map(|line| (line.quantity, line.unit_price)));

    let cart = match existing {
        Some(cart) => compare_and_swap(&txn, cart, total_items, total_price).await?,
        None => insert_cart(&txn, owner_id, total_items, total_price).await?,
    };

    persist_lines(&txn, cart.id, &stored, &lines).await?;

    txn.commit().await?;

    tracing::debug!(
        %owner_id,
        version = cart.version,
        total_items,
        total_price,
        "cart updated"
    );

    Ok(Cart {
        owner_id,
        lines,
        total_items,
        total_price,
        version: cart.version,
    })
}

/// Store new totals and bump the version, only if nobody else bumped it since
/// `cart` was read.
async fn compare_and_swap(
    txn: &DatabaseTransaction,
    cart: CartModel,
    total_items: i64,
    total_price: i64,
) -> AppResult<CartModel> {
    let now = Utc::now();
    let next_version = cart.version + 1;
    let result = Carts::update_many()
        .col_expr(CartCol::TotalItems, Expr::value(total_items))
        .col_expr(CartCol::TotalPrice, Expr::value(total_price))
        .col_expr(CartCol::Version, Expr::value(next_version))
        .col_expr(CartCol::UpdatedAt, Expr::value(now.fixed_offset()))
        .filter(CartCol::Id.eq(cart.id))
        .filter(CartCol::Version.eq(cart.version))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict("cart was modified concurrently".into()));
    }
    Ok(CartModel {
        total_items,
        total_price,
        version: next_version,
        updated_at: now.into(),
        ..cart
    })
}

async fn insert_cart(
    txn: &DatabaseTransaction,
    owner_id: Uuid,
    total_items: i64,
    total_price: i64,
) -> AppResult<CartModel> {
    let now = Utc::now();
    CartActive {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        total_items: Set(total_items),
        total_price: Set(total_price),
        version: Set(1),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await
    .map_err(conflict_on_unique)
}

/// Apply `mutation` to the in-memory line list. `product` is the freshly read
/// catalog entry for mutations that change quantities.
fn apply(
    lines: &mut Vec<CartLine>,
    mutation: CartMutation,
    product: Option<&Product>,
) -> AppResult<()> {
    match mutation {
        CartMutation::Add {
            product_id,
            qty,
            policy,
        } => {
            let product = product.ok_or(AppError::NotFound("Product"))?;
            match lines.iter_mut().find(|line| line.product_id == product_id) {
                Some(line) => {
                    let quantity = match policy {
                        CartMergePolicy::Replace => qty,
                        CartMergePolicy::Accumulate => line.quantity.saturating_add(qty),
                    };
                    inventory_service::ensure_available(product, quantity)?;
                    refresh_from_catalog(line, product);
                    line.quantity = quantity;
                }
                None => {
                    inventory_service::ensure_available(product, qty)?;
                    lines.push(CartLine {
                        product_id,
                        name: product.name.clone(),
                        image: product.image.clone(),
                        unit_price: product.price,
                        stock_at_add_time: product.stock,
                        quantity: qty,
                    });
                }
            }
        }
        CartMutation::SetQuantity { product_id, qty } => {
            let product = product.ok_or(AppError::NotFound("Product"))?;
            let line = lines
                .iter_mut()
                .find(|line| line.product_id == product_id)
                .ok_or(AppError::NotInCart)?;
            inventory_service::ensure_available(product, qty)?;
            refresh_from_catalog(line, product);
            line.quantity = qty;
        }
        CartMutation::Remove { product_id } => {
            let before = lines.len();
            lines.retain(|line| line.product_id != product_id);
            if lines.len() == before {
                return Err(AppError::NotInCart);
            }
        }
        CartMutation::Clear => lines.clear(),
    }
    Ok(())
}

fn refresh_from_catalog(line: &mut CartLine, product: &Product) {
    line.name = product.name.clone();
    line.image = product.image.clone();
    line.unit_price = product.price;
    line.stock_at_add_time = product.stock;
}

/// Write the difference between `stored` rows and the new `lines`.
async fn persist_lines(
    txn: &DatabaseTransaction,
    cart_id: Uuid,
    stored: &[LineModel],
    lines: &[CartLine],
) -> AppResult<()> {
    let mut by_product: HashMap<Uuid, &LineModel> =
        stored.iter().map(|row| (row.product_id, row)).collect();

    for line in lines {
        match by_product.remove(&line.product_id) {
            Some(row) if line_from_entity(row) == *line => {}
            Some(row) => {
                let mut active: LineActive = row.clone().into();
                active.name = Set(line.name.clone());
                active.image = Set(line.image.clone());
                active.unit_price = Set(line.unit_price);
                active.stock_at_add_time = Set(line.stock_at_add_time);
                active.quantity = Set(line.quantity);
                active.update(txn).await?;
            }
            None => {
                LineActive {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart_id),
                    product_id: Set(line.product_id),
                    name: Set(line.name.clone()),
                    image: Set(line.image.clone()),
                    unit_price: Set(line.unit_price),
                    stock_at_add_time: Set(line.stock_at_add_time),
                    quantity: Set(line.quantity),
                    created_at: Set(Utc::now().into()),
                }
                .insert(txn)
                .await
                .map_err(conflict_on_unique)?;
            }
        }
    }

    let removed: Vec<Uuid> = by_product.values().map(|row| row.id).collect();
    if !removed.is_empty() {
        CartLines::delete_many()
            .filter(LineCol::Id.is_in(removed))
            .exec(txn)
            .await?;
    }

    Ok(())
}

async fn load_lines<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<Vec<LineModel>> {
    Ok(CartLines::find()
        .filter(LineCol::CartId.eq(cart_id))
        .order_by_asc(LineCol::CreatedAt)
        .all(conn)
        .await?)
}

fn conflict_on_unique(err: sea_orm::DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("cart was created concurrently".into())
        }
        _ => err.into(),
    }
}

fn cart_from_rows(cart: &CartModel, rows: &[LineModel]) -> Cart {
    Cart {
        owner_id: cart.owner_id,
        lines: rows.iter().map(line_from_entity).collect(),
        total_items: cart.total_items,
        total_price: cart.total_price,
        version: cart.version,
    }
}

fn line_from_entity(row: &LineModel) -> CartLine {
    CartLine {
        product_id: row.product_id,
        name: row.name.clone(),
        image: row.image.clone(),
        unit_price: row.unit_price,
        stock_at_add_time: row.stock_at_add_time,
        quantity: row.quantity,
    }
}
