pub mod cart_service;
pub mod checkout_service;
pub mod inventory_service;
pub mod order_service;
pub mod payment_service;
pub mod wishlist_service;
