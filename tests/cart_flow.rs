mod common;

use std::sync::Arc;

use storefront_checkout::{
    config::CartMergePolicy,
    error::AppError,
    services::{cart_service, inventory_service},
};
use uuid::Uuid;

use common::{customer, mock_gateway, product, state, state_with};

#[tokio::test]
async fn reading_a_missing_cart_returns_an_empty_one() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;

    let cart = cart_service::get_cart(&state.orm, owner).await?;
    assert_eq!(cart.owner_id, owner);
    assert!(cart.lines.is_empty());
    assert_eq!(cart.total_items, 0);
    assert_eq!(cart.total_price, 0);
    Ok(())
}

#[tokio::test]
async fn adding_items_snapshots_catalog_data_and_totals() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let lamp = product(&state, "Brass Lamp", 45_000, 4).await?;
    let throw = product(&state, "Cotton Throw", 12_000, 10).await?;

    cart_service::add_item(&state, owner, lamp.id, 2).await?;
    let cart = cart_service::add_item(&state, owner, throw.id, 3).await?;

    assert_eq!(cart.lines.len(), 2);
    assert_eq!(cart.total_items, 5);
    assert_eq!(cart.total_price, 2 * 45_000 + 3 * 12_000);

    let line = cart.line(lamp.id).expect("lamp line");
    assert_eq!(line.name, "Brass Lamp");
    assert_eq!(line.unit_price, 45_000);
    assert_eq!(line.stock_at_add_time, 4);

    // the stored cart matches what the write returned
    let stored = cart_service::get_cart(&state.orm, owner).await?;
    assert_eq!(stored.lines, cart.lines);
    assert_eq!(stored.version, cart.version);
    Ok(())
}

#[tokio::test]
async fn re_adding_replaces_the_quantity_by_default() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let vase = product(&state, "Terracotta Vase", 10_000, 5).await?;

    cart_service::add_item(&state, owner, vase.id, 2).await?;
    let cart = cart_service::add_item(&state, owner, vase.id, 3).await?;

    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.line(vase.id).map(|l| l.quantity), Some(3));
    assert_eq!(cart.total_items, 3);
    Ok(())
}

#[tokio::test]
async fn accumulate_policy_adds_and_checks_the_combined_quantity() -> anyhow::Result<()> {
    let state = state_with(Arc::new(mock_gateway()), |config| {
        config.cart_merge_policy = CartMergePolicy::Accumulate;
    })
    .await?;
    let owner = customer().user_id;
    let vase = product(&state, "Terracotta Vase", 10_000, 5).await?;

    cart_service::add_item(&state, owner, vase.id, 2).await?;
    let cart = cart_service::add_item(&state, owner, vase.id, 3).await?;
    assert_eq!(cart.line(vase.id).map(|l| l.quantity), Some(5));

    let err = cart_service::add_item(&state, owner, vase.id, 1).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock { requested: 6, available: 5, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn adding_more_than_stock_leaves_cart_unchanged() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let vase = product(&state, "Terracotta Vase", 10_000, 2).await?;

    let before = cart_service::add_item(&state, owner, vase.id, 1).await?;
    let err = cart_service::add_item(&state, owner, vase.id, 3).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { requested: 3, available: 2, .. }));

    let after = cart_service::get_cart(&state.orm, owner).await?;
    assert_eq!(after.lines, before.lines);
    assert_eq!(after.version, before.version);
    Ok(())
}

#[tokio::test]
async fn invalid_requests_are_rejected() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let vase = product(&state, "Terracotta Vase", 10_000, 2).await?;

    let err = cart_service::add_item(&state, owner, vase.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidQuantity));

    let err = cart_service::add_item(&state, owner, Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Product")));

    let err = cart_service::set_item_quantity(&state, owner, vase.id, 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotInCart));

    let err = cart_service::remove_item(&state, owner, vase.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotInCart));
    Ok(())
}

#[tokio::test]
async fn set_quantity_checks_current_stock() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let admin = common::admin();
    let vase = product(&state, "Terracotta Vase", 10_000, 5).await?;

    cart_service::add_item(&state, owner, vase.id, 1).await?;

    // stock drops after the line was added
    inventory_service::adjust_inventory(
        &state,
        &admin,
        vase.id,
        storefront_checkout::dto::inventory::InventoryAdjustRequest { delta: -3 },
    )
    .await?;

    let err = cart_service::set_item_quantity(&state, owner, vase.id, 3).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 2, .. }));

    let cart = cart_service::set_item_quantity(&state, owner, vase.id, 2).await?;
    let line = cart.line(vase.id).expect("vase line");
    assert_eq!(line.quantity, 2);
    assert_eq!(line.stock_at_add_time, 2);

    let err = cart_service::set_item_quantity(&state, owner, vase.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidQuantity));
    Ok(())
}

#[tokio::test]
async fn remove_and_clear() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let lamp = product(&state, "Brass Lamp", 45_000, 4).await?;
    let throw = product(&state, "Cotton Throw", 12_000, 10).await?;

    cart_service::add_item(&state, owner, lamp.id, 1).await?;
    cart_service::add_item(&state, owner, throw.id, 2).await?;

    let cart = cart_service::remove_item(&state, owner, lamp.id).await?;
    assert!(cart.line(lamp.id).is_none());
    assert_eq!(cart.total_price, 24_000);

    let cart = cart_service::clear(&state, owner).await?;
    assert!(cart.lines.is_empty());
    assert_eq!(cart.total_items, 0);

    // clearing is idempotent, with or without a stored cart
    cart_service::clear(&state, owner).await?;
    cart_service::clear(&state, customer().user_id).await?;
    assert!(cart_service::get_cart(&state.orm, owner).await?.lines.is_empty());
    Ok(())
}

#[tokio::test]
async fn every_write_bumps_the_version() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;
    let vase = product(&state, "Terracotta Vase", 10_000, 5).await?;

    let first = cart_service::add_item(&state, owner, vase.id, 1).await?;
    let second = cart_service::set_item_quantity(&state, owner, vase.id, 2).await?;
    let third = cart_service::clear(&state, owner).await?;

    assert_eq!(first.version, 1);
    assert_eq!(second.version, 2);
    assert_eq!(third.version, 3);
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_are_all_kept() -> anyhow::Result<()> {
    let state = state().await?;
    let owner = customer().user_id;

    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(product(&state, &format!("Coaster {i}"), 2_000, 10).await?.id);
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            cart_service::add_item(&state, owner, id, 1).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let cart = cart_service::get_cart(&state.orm, owner).await?;
    assert_eq!(cart.lines.len(), ids.len());
    assert_eq!(cart.total_items, 4);
    assert_eq!(cart.version, 4);
    Ok(())
}

#[tokio::test]
async fn two_tabs_adding_the_same_product_keep_both_units() -> anyhow::Result<()> {
    let state = state_with(Arc::new(mock_gateway()), |config| {
        config.cart_merge_policy = CartMergePolicy::Accumulate;
    })
    .await?;
    let owner = customer().user_id;
    let vase = product(&state, "Terracotta Vase", 10_000, 10).await?;

    let tabs: Vec<_> = (0..2)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { cart_service::add_item(&state, owner, vase.id, 1).await })
        })
        .collect();
    for tab in tabs {
        tab.await??;
    }

    let cart = cart_service::get_cart(&state.orm, owner).await?;
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.line(vase.id).map(|l| l.quantity), Some(2));
    assert_eq!(cart.total_items, 2);
    assert_eq!(cart.total_price, 20_000);
    assert_eq!(cart.version, 2);
    Ok(())
}
