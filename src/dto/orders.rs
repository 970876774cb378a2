use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, ShippingAddress};

/// One line of a client-held cart snapshot. Only `productId` and `qty` are
/// trusted; names and prices are re-read from the catalog.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    #[serde(alias = "product")]
    pub product_id: Uuid,
    pub qty: i32,
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Option<i64>,
}

/// `POST /orders` body: the checkout session assembled by the client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Cart snapshot; when absent the server-held cart is used.
    pub order_items: Option<Vec<CheckoutLine>>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Option<i64>,
    pub tax_price: Option<i64>,
    pub shipping_price: Option<i64>,
    pub total_price: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
