//! Error types for the order engine and their HTTP rendering

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, UnknownStatus};
use crate::domain::value_objects::MoneyError;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("product {0} not found")]
    ProductNotFound(Uuid),

    #[error("delivery option {0} is unknown or inactive")]
    UnknownDeliveryOption(Uuid),

    #[error("order has no items")]
    EmptyOrder,

    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: i32 },

    #[error("product {0} appears more than once in the request")]
    DuplicateLine(Uuid),

    #[error("order has {count} lines, at most {max} allowed")]
    TooManyLines { count: usize, max: usize },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cart changed for product {product_id}: requested {requested}, cart has {}", in_cart.map(|q| q.to_string()).unwrap_or_else(|| "none".into()))]
    CartDesynchronized { product_id: Uuid, requested: i32, in_cart: Option<i32> },

    #[error("cannot move order from {current} to {requested}")]
    InvalidTransition { current: OrderStatus, requested: OrderStatus },

    #[error("insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock { product_id: Uuid, available: i32, requested: i32 },

    #[error("order in status {0} cannot be cancelled")]
    CannotCancel(OrderStatus),

    #[error("operation cancelled before completion")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored order status: {0}")]
    CorruptStatus(#[from] UnknownStatus),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

/// Abstract error classes callers branch on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind { NotFound, Validation, CartDesynchronized, InvalidTransition, InsufficientStock, CannotCancel, Cancelled, Infrastructure }

impl From<MoneyError> for OrderError {
    fn from(e: MoneyError) -> Self { OrderError::Validation(e.to_string()) }
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OrderNotFound(_) | Self::ProductNotFound(_) | Self::UnknownDeliveryOption(_) => ErrorKind::NotFound,
            Self::EmptyOrder | Self::InvalidQuantity { .. } | Self::DuplicateLine(_) | Self::TooManyLines { .. } | Self::Validation(_) => ErrorKind::Validation,
            Self::CartDesynchronized { .. } => ErrorKind::CartDesynchronized,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::CannotCancel(_) => ErrorKind::CannotCancel,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Database(_) | Self::CorruptStatus(_) | Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // Checkout reports a stale delivery choice as a conflict with the client's view
            Self::UnknownDeliveryOption(_) => StatusCode::CONFLICT,
            _ => match self.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::CartDesynchronized | ErrorKind::InvalidTransition | ErrorKind::InsufficientStock | ErrorKind::CannotCancel => StatusCode::CONFLICT,
                ErrorKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::OrderNotFound(_) | Self::ProductNotFound(_) => json!({"error": "not_found", "message": self.to_string()}),
            Self::UnknownDeliveryOption(id) => json!({"error": "unknown_delivery_option", "message": self.to_string(), "deliveryServiceId": id}),
            Self::CartDesynchronized { product_id, requested, in_cart } => json!({
                "error": "cart_desynchronized", "message": self.to_string(),
                "productId": product_id, "requestedQuantity": requested, "cartQuantity": in_cart,
            }),
            Self::InvalidTransition { current, requested } => json!({
                "error": "invalid_transition", "message": self.to_string(), "current": current, "requested": requested,
            }),
            Self::InsufficientStock { product_id, available, requested } => json!({
                "error": "insufficient_stock", "message": self.to_string(),
                "productId": product_id, "available": available, "requested": requested,
            }),
            Self::CannotCancel(status) => json!({"error": "cannot_cancel", "message": self.to_string(), "status": status}),
            Self::Cancelled => json!({"error": "cancelled", "message": self.to_string()}),
            _ if self.kind() == ErrorKind::Validation => json!({"error": "validation", "message": self.to_string()}),
            _ => json!({"error": "internal", "message": "internal server error"}),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors surfaced by the HTTP layer
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("missing or invalid caller identity")]
    Unauthorized,

    #[error("caller may not access this resource")]
    Forbidden,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self { ApiError::InvalidRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Order(e) if e.kind() == ErrorKind::Infrastructure => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, error = %e, "order request failed");
                let mut body = e.body();
                body["correlationId"] = json!(correlation_id);
                (e.status_code(), body)
            }
            ApiError::Order(e) => {
                tracing::debug!(error = %e, "order request rejected");
                (e.status_code(), e.body())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({"error": "unauthorized", "message": self.to_string()})),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, json!({"error": "forbidden", "message": self.to_string()})),
            ApiError::InvalidRequest(m) => (StatusCode::BAD_REQUEST, json!({"error": "validation", "message": m})),
        };
        (status, Json(body)).into_response()
    }
}
