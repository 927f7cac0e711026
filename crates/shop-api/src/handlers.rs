//! # Request Handlers
//!
//! Axum request handlers. Each one authenticates, decodes the request and
//! delegates to a core service; no business rule lives here.

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath, AppQuery, Auth};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use shop_core::{
    CartLine, CartView, OrderDetails, OrderReceipt, OrderStatus, Page, PageRequest, PaymentDetails,
    PaymentHandoff, PaymentOutcome, PaymentStatus, ShopError, TokenPair,
};
use tracing::instrument;
use uuid::Uuid;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    #[serde(default)]
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub transaction_id: String,
}

/// `?page=&limit=&status=` for listings
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl ListQuery {
    fn page(&self) -> ApiResult<PageRequest> {
        let defaults = PageRequest::default();
        Ok(PageRequest::new(
            self.page.unwrap_or(defaults.page()),
            self.limit.unwrap_or(defaults.limit()),
        )?)
    }

    fn status<S>(&self) -> ApiResult<Option<S>>
    where
        S: std::str::FromStr<Err = ShopError>,
    {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(raw.parse()?)),
        }
    }
}

// =============================================================================
// Health
// =============================================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shop-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// =============================================================================
// Auth
// =============================================================================

pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.identity.exchange_refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

pub async fn logout(State(state): State<AppState>, Auth(principal): Auth) -> ApiResult<StatusCode> {
    state.identity.revoke(principal.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Cart
// =============================================================================

pub async fn view_cart(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.carts.view(principal.user_id).await?))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppJson(request): AppJson<AddToCartRequest>,
) -> ApiResult<(StatusCode, Json<CartLine>)> {
    let line = state
        .carts
        .add_item(principal.user_id, &request.product_id, request.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppPath(line_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateQuantityRequest>,
) -> ApiResult<Json<CartLine>> {
    let line = state
        .carts
        .update_quantity(principal.user_id, line_id, request.quantity)
        .await?;
    Ok(Json(line))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppPath(line_id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.carts.remove_item(principal.user_id, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_cart(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<impl IntoResponse> {
    let removed = state.carts.clear(principal.user_id).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

// =============================================================================
// Orders
// =============================================================================

#[instrument(skip_all)]
pub async fn create_order(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> ApiResult<(StatusCode, Json<OrderReceipt>)> {
    let receipt = state.orders.create_order(principal.user_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<Page<OrderDetails>>> {
    let page = state
        .orders
        .list_user_orders(principal.user_id, query.page()?, query.status::<OrderStatus>()?)
        .await?;
    Ok(Json(page))
}

pub async fn get_order(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppPath(order_id): AppPath<Uuid>,
) -> ApiResult<Json<OrderDetails>> {
    let details = state
        .orders
        .get_order(principal.user_id, order_id, principal.is_admin())
        .await?;
    Ok(Json(details))
}

pub async fn list_all_orders(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<Page<OrderDetails>>> {
    principal.require_admin()?;
    let page = state
        .orders
        .list_orders(query.page()?, query.status::<OrderStatus>()?)
        .await?;
    Ok(Json(page))
}

#[instrument(skip_all)]
pub async fn set_order_status(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppPath(order_id): AppPath<Uuid>,
    AppJson(request): AppJson<StatusUpdateRequest>,
) -> ApiResult<Json<OrderDetails>> {
    principal.require_admin()?;
    let status: OrderStatus = request.status.trim().parse()?;
    let details = state.orders.set_order_status(order_id, status).await?;
    Ok(Json(details))
}

// =============================================================================
// Payments
// =============================================================================

#[instrument(skip_all)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppJson(request): AppJson<InitiatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentHandoff>)> {
    let order_id = request
        .order_id
        .ok_or_else(|| ApiError::BadRequest("Order ID is required".to_string()))?;
    let handoff = state
        .payments
        .initiate_payment(principal.user_id, order_id)
        .await?;
    Ok((StatusCode::CREATED, Json(handoff)))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Auth(_): Auth,
    AppQuery(query): AppQuery<TransactionRequest>,
) -> ApiResult<Json<PaymentOutcome>> {
    let outcome = state.payments.verify_payment(&query.transaction_id).await?;
    Ok(Json(outcome))
}

pub async fn capture_payment(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppJson(request): AppJson<TransactionRequest>,
) -> ApiResult<Json<PaymentOutcome>> {
    let outcome = state
        .payments
        .capture_payment(principal.user_id, &request.transaction_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn list_my_payments(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<Page<PaymentDetails>>> {
    let page = state
        .payments
        .list_user_payments(principal.user_id, query.page()?, query.status::<PaymentStatus>()?)
        .await?;
    Ok(Json(page))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Auth(principal): Auth,
    AppPath(payment_id): AppPath<Uuid>,
) -> ApiResult<Json<PaymentDetails>> {
    principal.require_admin()?;
    Ok(Json(state.payments.get_payment(payment_id).await?))
}
