//! # shop-api
//!
//! HTTP API layer for the storefront order and payment core.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Bearer-credential authentication (`extract::Auth`)
//! - A uniform `{ error, kind, code }` error body
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/auth/refresh` | Exchange refresh credential |
//! | POST | `/api/v1/auth/logout` | Revoke refresh credential |
//! | GET/POST/DELETE | `/api/v1/cart` | View / add / clear cart |
//! | PATCH/DELETE | `/api/v1/cart/{line_id}` | Change quantity / remove line |
//! | POST | `/api/v1/orders` | Create order from cart |
//! | GET | `/api/v1/orders` | Caller's orders |
//! | GET | `/api/v1/orders/{id}` | Order with payments |
//! | POST | `/api/v1/payments` | Initiate payment |
//! | GET | `/api/v1/payments/verify` | Verify payment |
//! | POST | `/api/v1/payments/capture` | Capture payment |
//! | GET | `/api/v1/payments` | Caller's payments |
//! | GET | `/api/v1/admin/orders` | All orders |
//! | PATCH | `/api/v1/admin/orders/{id}/status` | Set order status |
//! | GET | `/api/v1/admin/payments/{id}` | Payment with order |

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
