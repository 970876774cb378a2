use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{ConnAcquireErr, DbErr};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    payments::GatewayError,
    response::{ApiResponse, Meta},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Product not found in cart")]
    NotInCart,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Not enough stock for {name}: requested {requested}, only {available} available")]
    InsufficientStock {
        product_id: Uuid,
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("No order items")]
    EmptyOrder,

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Order is not paid")]
    NotPaid,

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Unauthorized {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict {0}")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    ExternalService(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("ORM error")]
    OrmError(DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::NotInCart => "not_in_cart",
            AppError::BadRequest(_) => "bad_request",
            AppError::InvalidQuantity => "invalid_quantity",
            AppError::InsufficientStock { .. } => "insufficient_stock",
            AppError::EmptyOrder => "empty_order",
            AppError::AlreadyPaid => "already_paid",
            AppError::NotPaid => "not_paid",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::ExternalService(_) => "external_service_error",
            AppError::Timeout => "timeout",
            AppError::OrmError(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::NotInCart => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::InvalidQuantity
            | AppError::EmptyOrder
            | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock { .. }
            | AppError::AlreadyPaid
            | AppError::NotPaid
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::OrmError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => AppError::Timeout,
            other => AppError::OrmError(other),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => AppError::Timeout,
            other => AppError::ExternalService(other.to_string()),
        }
    }
}

/// Body of the `data` field on error responses.
#[derive(Serialize, ToSchema)]
pub struct ErrorData {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                code: self.code(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
