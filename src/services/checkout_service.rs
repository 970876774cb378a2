//! Checkout flow: turn a cart snapshot into an order, then empty the cart.

use std::time::Duration;

use uuid::Uuid;

use crate::{
    dto::orders::CreateOrderRequest,
    error::{AppError, AppResult},
    models::{Order, ShippingAddress},
    services::{cart_service, order_service},
    state::AppState,
};

const CLEAR_ATTEMPTS: u32 = 3;
const CLEAR_INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Everything the ledger needs to create an order.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// `(product id, qty)` in the order the client listed them.
    pub lines: Vec<(Uuid, i32)>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    /// Total the client computed, kept only to flag drift.
    pub client_total_price: Option<i64>,
}

impl CheckoutSession {
    pub fn validate(&self) -> AppResult<()> {
        if self.lines.is_empty() {
            return Err(AppError::EmptyOrder);
        }
        if self.lines.iter().any(|(_, qty)| *qty < 1) {
            return Err(AppError::InvalidQuantity);
        }

        let address = &self.shipping_address;
        for (field, value) in [
            ("address", &address.address),
            ("city", &address.city),
            ("postalCode", &address.postal_code),
            ("country", &address.country),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("shippingAddress.{field} is required")));
            }
        }
        if self.payment_method.trim().is_empty() {
            return Err(AppError::BadRequest("paymentMethod is required".into()));
        }
        Ok(())
    }

    /// Lines with repeated products folded into one, first position kept.
    pub fn merged_lines(&self) -> Vec<(Uuid, i32)> {
        let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(self.lines.len());
        for &(product_id, qty) in &self.lines {
            match merged.iter_mut().find(|(id, _)| *id == product_id) {
                Some((_, total)) => *total = total.saturating_add(qty),
                None => merged.push((product_id, qty)),
            }
        }
        merged
    }
}

/// Place an order for `owner_id`.
///
/// Without `orderItems` the server-held cart is the snapshot. Once the order
/// is committed it stands even if the cart cannot be cleared afterwards.
pub async fn place_order(
    state: &AppState,
    owner_id: Uuid,
    request: CreateOrderRequest,
) -> AppResult<Order> {
    let lines = match request.order_items {
        Some(items) => items.into_iter().map(|line| (line.product_id, line.qty)).collect(),
        None => cart_service::get_cart(&state.orm, owner_id)
            .await?
            .lines
            .into_iter()
            .map(|line| (line.product_id, line.quantity))
            .collect(),
    };

    let session = CheckoutSession {
        lines,
        shipping_address: request.shipping_address,
        payment_method: request.payment_method,
        client_total_price: request.total_price,
    };

    let order = order_service::create_order(state, owner_id, &session).await?;
    clear_cart_after_checkout(state, owner_id, order.id).await;
    Ok(order)
}

async fn clear_cart_after_checkout(state: &AppState, owner_id: Uuid, order_id: Uuid) {
    let mut delay = CLEAR_INITIAL_BACKOFF;
    for attempt in 1..=CLEAR_ATTEMPTS {
        match cart_service::clear(state, owner_id).await {
            Ok(_) => return,
            Err(err) if attempt < CLEAR_ATTEMPTS => {
                tracing::debug!(%owner_id, attempt, error = %err, "cart clear failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => {
                tracing::warn!(%owner_id, %order_id, error = %err, "order placed but cart was not cleared");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(lines: Vec<(Uuid, i32)>) -> CheckoutSession {
        CheckoutSession {
            lines,
            shipping_address: ShippingAddress {
                address: "12 Market Road".into(),
                city: "Pune".into(),
                postal_code: "411001".into(),
                country: "IN".into(),
            },
            payment_method: "Razorpay".into(),
            client_total_price: None,
        }
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        assert!(matches!(session(vec![]).validate(), Err(AppError::EmptyOrder)));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let s = session(vec![(Uuid::new_v4(), 1), (Uuid::new_v4(), 0)]);
        assert!(matches!(s.validate(), Err(AppError::InvalidQuantity)));
    }

    #[test]
    fn blank_address_field_is_rejected() {
        let mut s = session(vec![(Uuid::new_v4(), 1)]);
        s.shipping_address.city = "  ".into();
        assert!(matches!(s.validate(), Err(AppError::BadRequest(msg)) if msg.contains("city")));
    }

    #[test]
    fn blank_payment_method_is_rejected() {
        let mut s = session(vec![(Uuid::new_v4(), 1)]);
        s.payment_method = String::new();
        assert!(matches!(s.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn duplicate_products_are_folded() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = session(vec![(a, 1), (b, 2), (a, 3)]);
        assert_eq!(s.merged_lines(), vec![(a, 4), (b, 2)]);
    }
}
