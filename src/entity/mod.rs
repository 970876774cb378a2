pub mod audit_logs;
pub mod cart_lines;
pub mod carts;
pub mod gateway_orders;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod wishlist_items;

pub use audit_logs::Entity as AuditLogs;
pub use cart_lines::Entity as CartLines;
pub use carts::Entity as Carts;
pub use gateway_orders::Entity as GatewayOrders;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use wishlist_items::Entity as WishlistItems;
