//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main application router
///
/// Routes (all under `/api/v1` require a bearer credential, except refresh):
/// - Auth:
///   - POST /auth/refresh - Exchange a refresh credential for a new pair
///   - POST /auth/logout - Revoke the caller's refresh credential
///
/// - Cart:
///   - GET/POST/DELETE /cart - View, add a line, clear
///   - PATCH/DELETE /cart/{line_id} - Change quantity, remove a line
///
/// - Orders:
///   - POST /orders - Turn the cart into an order
///   - GET /orders - Caller's orders
///   - GET /orders/{order_id} - One order with its payments
///
/// - Payments:
///   - POST /payments - Start paying for an order
///   - GET /payments/verify?transaction_id= - Reconcile with the gateway
///   - POST /payments/capture - Capture an approved payment
///   - GET /payments - Caller's payments
///
/// - Admin:
///   - GET /admin/orders - All orders
///   - PATCH /admin/orders/{order_id}/status - Override order status
///   - GET /admin/payments/{payment_id} - One payment with its order
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/refresh", post(handlers::refresh_token))
        .route("/logout", post(handlers::logout));

    let cart_routes = Router::new()
        .route(
            "/",
            get(handlers::view_cart)
                .post(handlers::add_to_cart)
                .delete(handlers::clear_cart),
        )
        .route(
            "/{line_id}",
            patch(handlers::update_cart_item).delete(handlers::remove_cart_item),
        );

    let order_routes = Router::new()
        .route("/", post(handlers::create_order).get(handlers::list_my_orders))
        .route("/{order_id}", get(handlers::get_order));

    let payment_routes = Router::new()
        .route(
            "/",
            post(handlers::initiate_payment).get(handlers::list_my_payments),
        )
        .route("/verify", get(handlers::verify_payment))
        .route("/capture", post(handlers::capture_payment));

    let admin_routes = Router::new()
        .route("/orders", get(handlers::list_all_orders))
        .route("/orders/{order_id}/status", patch(handlers::set_order_status))
        .route("/payments/{payment_id}", get(handlers::get_payment));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/cart", cart_routes)
        .nest("/orders", order_routes)
        .nest("/payments", payment_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
