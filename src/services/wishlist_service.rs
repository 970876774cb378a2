use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::wishlist::{WishlistAction, WishlistProducts, WishlistToggle},
    entity::{
        products::Entity as Products,
        wishlist_items::{ActiveModel as WishlistActive, Column as WishlistCol, Entity as WishlistItems},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::inventory_service::product_from_entity,
    state::AppState,
};

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProducts>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = WishlistItems::find().filter(WishlistCol::OwnerId.eq(user.user_id));
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .find_also_related(Products)
        .order_by_desc(WishlistCol::AddedAt)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(_, product)| product.map(product_from_entity))
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Wishlist", WishlistProducts { items }, Some(meta)))
}

/// Add the product to the wishlist, or remove it if it is already there.
pub async fn toggle(state: &AppState, user: &AuthUser, product_id: Uuid) -> AppResult<WishlistToggle> {
    if Products::find_by_id(product_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound("Product"));
    }

    let existing = WishlistItems::find()
        .filter(WishlistCol::OwnerId.eq(user.user_id))
        .filter(WishlistCol::ProductId.eq(product_id))
        .one(&state.orm)
        .await?;

    let action = match existing {
        Some(item) => {
            item.delete(&state.orm).await?;
            WishlistAction::Removed
        }
        None => {
            let inserted = WishlistActive {
                id: Set(Uuid::new_v4()),
                owner_id: Set(user.user_id),
                product_id: Set(product_id),
                added_at: Set(Utc::now().into()),
            }
            .insert(&state.orm)
            .await;
            match inserted {
                Ok(_) => WishlistAction::Added,
                // a concurrent toggle already added it
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    WishlistAction::Added
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    let audit_action = match action {
        WishlistAction::Added => "wishlist_add",
        WishlistAction::Removed => "wishlist_remove",
    };
    audit::record(
        &state.orm,
        Some(user.user_id),
        audit_action,
        "wishlist_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(WishlistToggle { action })
}
