//! API error type with HTTP response mapping.
//!
//! Every failure renders as `{ "error": message, "kind": kind, "code": status }`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shop_core::{ErrorKind, ShopError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Shop(#[from] ShopError),

    /// Body, path or query could not be decoded
    #[error("{0}")]
    BadRequest(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub code: u16,
}

impl ApiError {
    fn parts(&self) -> (u16, ErrorKind, String) {
        match self {
            ApiError::Shop(err) => {
                let kind = err.kind();
                let message = match kind {
                    ErrorKind::Internal => "Internal server error".to_string(),
                    _ => err.to_string(),
                };
                (err.status_code(), kind, message)
            }
            ApiError::BadRequest(msg) => (400, ErrorKind::Validation, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, kind, error) = self.parts();
        if kind == ErrorKind::Internal {
            tracing::error!(error = %self, "internal server error");
        }

        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error, kind, code })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_conflict_mapping() {
        let err = ApiError::from(ShopError::PaymentAlreadyActive {
            order_id: Uuid::nil(),
        });
        let (code, kind, _) = err.parts();
        assert_eq!(code, 409);
        assert_eq!(kind, ErrorKind::Conflict);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::from(ShopError::Invariant("stock went negative".to_string()));
        let (code, kind, message) = err.parts();
        assert_eq!(code, 500);
        assert_eq!(kind, ErrorKind::Internal);
        assert!(!message.contains("stock"));
    }

    #[test]
    fn test_timeout_is_gateway_timeout() {
        let err = ApiError::from(ShopError::GatewayTimeout {
            provider: "paypal".to_string(),
            operation: "capture",
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
