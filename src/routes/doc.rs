use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, SetQuantityRequest},
        inventory::{InventoryAdjustRequest, LowStockQuery, ProductList},
        orders::{CheckoutLine, CreateOrderRequest, OrderList},
        payments::{
            CreateGatewayOrderRequest, GatewayKeyResponse, GatewayOrderResponse, PayOrderRequest,
            WebhookAck,
        },
        wishlist::{WishlistAction, WishlistProducts, WishlistToggle},
    },
    error::ErrorData,
    models::{Cart, CartLine, Order, OrderItem, PaymentResult, Product, ShippingAddress},
    response::{ApiResponse, Meta},
    routes::{admin, cart, health, orders, params, payments, wishlist},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::get_cart,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::create_order,
        orders::list_my_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::pay_order,
        orders::deliver_order,
        orders::create_gateway_order,
        orders::gateway_key,
        payments::webhook,
        wishlist::list_wishlist,
        wishlist::toggle_wishlist,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            Product,
            Cart,
            CartLine,
            Order,
            OrderItem,
            ShippingAddress,
            PaymentResult,
            AddToCartRequest,
            SetQuantityRequest,
            CheckoutLine,
            CreateOrderRequest,
            OrderList,
            CreateGatewayOrderRequest,
            GatewayOrderResponse,
            GatewayKeyResponse,
            PayOrderRequest,
            WebhookAck,
            WishlistAction,
            WishlistToggle,
            WishlistProducts,
            InventoryAdjustRequest,
            LowStockQuery,
            ProductList,
            params::Pagination,
            params::OrderListQuery,
            params::SortOrder,
            ErrorData,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<ProductList>,
            ApiResponse<WishlistProducts>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment gateway endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
