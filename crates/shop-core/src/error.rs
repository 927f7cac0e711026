//! # Shop Error Types
//!
//! Typed error handling for the storefront core.
//! Every operation returns `Result<T, ShopError>`, and every error projects
//! onto one stable [`ErrorKind`] that callers can branch on.

use crate::order::OrderStatus;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Stable failure category surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed input; retrying without a change will fail again
    Validation,
    /// Referenced entity is absent or not owned by the caller
    NotFound,
    /// Request clashes with current state (stock, active payment, capture)
    Conflict,
    /// Identity could not be established
    Unauthorized,
    /// Identity is known but lacks the required role
    Forbidden,
    /// Payment gateway failed or timed out; retryable
    Upstream,
    /// Should-never-happen state mismatch
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing secrets, invalid values)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Checkout attempted with nothing in the cart
    #[error("Your cart is empty")]
    EmptyCart,

    /// Product not found
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Cart line not found for this user
    #[error("Cart item not found: {line_id}")]
    CartItemNotFound { line_id: Uuid },

    /// Order not found, or not visible to the caller
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: Uuid },

    /// Payment not found, or not visible to the caller
    #[error("Payment not found: {reference}")]
    PaymentNotFound { reference: String },

    /// User not found
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: Uuid },

    /// Not enough stock to satisfy a line
    #[error("Not enough stock for {product_name} ({product_id}): requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// A pending or completed payment already exists for the order
    #[error("Payment already exists for order {order_id}")]
    PaymentAlreadyActive { order_id: Uuid },

    /// Order status does not allow the requested payment action
    #[error("Cannot process payment for order {order_id} with status: {status}")]
    OrderNotPayable { order_id: Uuid, status: OrderStatus },

    /// The cart was modified between reading it and placing the order
    #[error("Cart changed while the order was being placed, please retry")]
    CartChanged,

    /// Another capture for the same payment has not finished yet
    #[error("Capture already in progress for payment {payment_id}")]
    CaptureInProgress { payment_id: Uuid },

    /// Missing, malformed or invalid credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Refresh credential superseded, revoked, or never issued
    #[error("Refresh token is expired or used")]
    Expired,

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Payment provider rejected or failed the call
    #[error("Payment provider error [{provider}]: {message}")]
    Upstream { provider: String, message: String },

    /// Payment provider did not answer in time
    #[error("Payment provider [{provider}] timed out during {operation}")]
    GatewayTimeout {
        provider: String,
        operation: &'static str,
    },

    /// Internal invariant violated (should not happen)
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

impl ShopError {
    /// Project onto the stable error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShopError::Validation(_) | ShopError::EmptyCart => ErrorKind::Validation,
            ShopError::ProductNotFound { .. }
            | ShopError::CartItemNotFound { .. }
            | ShopError::OrderNotFound { .. }
            | ShopError::PaymentNotFound { .. }
            | ShopError::UserNotFound { .. } => ErrorKind::NotFound,
            ShopError::InsufficientStock { .. }
            | ShopError::PaymentAlreadyActive { .. }
            | ShopError::OrderNotPayable { .. }
            | ShopError::CartChanged
            | ShopError::CaptureInProgress { .. } => ErrorKind::Conflict,
            ShopError::Unauthorized(_) | ShopError::Expired => ErrorKind::Unauthorized,
            ShopError::Forbidden(_) => ErrorKind::Forbidden,
            ShopError::Upstream { .. } | ShopError::GatewayTimeout { .. } => ErrorKind::Upstream,
            ShopError::Configuration(_) | ShopError::Invariant(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Upstream
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::GatewayTimeout { .. } => 504,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::Conflict => 409,
                ErrorKind::Unauthorized => 401,
                ErrorKind::Forbidden => 403,
                ErrorKind::Upstream => 502,
                ErrorKind::Internal => 500,
            },
        }
    }

    /// Build an invariant error, logging it where it is raised
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "internal invariant violated");
        ShopError::Invariant(message)
    }
}

/// Result type alias for storefront operations
pub type ShopResult<T> = Result<T, ShopError>;
