//! External payment processor integration.

pub mod gateway;
pub mod razorpay;
pub mod signature;

pub use gateway::{
    GatewayError, GatewayOrder, GatewayOrderRequest, MockPaymentGateway, PaymentGateway,
};
pub use razorpay::RazorpayGateway;
