use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WishlistAction {
    Added,
    Removed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistToggle {
    pub action: WishlistAction,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct WishlistProducts {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
