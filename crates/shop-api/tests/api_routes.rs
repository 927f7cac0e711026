//! Router tests: HTTP in, JSON out, against an in-memory store and a stub gateway.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shop_api::{create_router, AppConfig, AppState};
use shop_core::{
    Currency, IdentityConfig, MemoryStore, PaymentGateway, PaymentIntent, Price, Product,
    RemoteStatus, Role, ShopResult, ShopSettings, TokenPair, UserRecord,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Approves and completes everything
struct StubGateway {
    issued: AtomicU32,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(
        &self,
        _amount: &Price,
        _order_ref: &str,
        _idempotency_key: &str,
    ) -> ShopResult<PaymentIntent> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            transaction_id: format!("PAYID-{n}"),
            approval_url: format!("https://paypal.test/checkoutnow?token=PAYID-{n}"),
        })
    }

    async fn get_status(&self, _transaction_id: &str) -> ShopResult<RemoteStatus> {
        Ok(RemoteStatus::new("APPROVED"))
    }

    async fn capture(&self, _transaction_id: &str) -> ShopResult<RemoteStatus> {
        Ok(RemoteStatus::new("COMPLETED"))
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

struct TestApp {
    state: AppState,
    customer: TokenPair,
    admin: TokenPair,
}

async fn setup() -> TestApp {
    let store = MemoryStore::new();
    store
        .seed_products([
            Product::new("mug", "Mug", Price::from_cents(1000, Currency::USD), 5),
            Product::new("pen", "Pen", Price::from_cents(150, Currency::USD), 1),
        ])
        .await;

    let customer = UserRecord::new("Customer", Role::User);
    let admin = UserRecord::new("Admin", Role::Admin);
    let (customer_id, admin_id) = (customer.id, admin.id);
    store.insert_user(customer).await;
    store.insert_user(admin).await;

    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
    };
    let state = AppState::new(
        config,
        ShopSettings::default(),
        IdentityConfig::new("test-access-secret", "test-refresh-secret"),
        store,
        Arc::new(StubGateway {
            issued: AtomicU32::new(0),
        }),
    );

    let customer = state.identity.rotate_refresh(customer_id).await.unwrap();
    let admin = state.identity.rotate_refresh(admin_id).await.unwrap();

    TestApp {
        state,
        customer,
        admin,
    }
}

impl TestApp {
    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn as_customer(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.customer.access_token.clone();
        self.send(method, uri, Some(&token), body).await
    }

    async fn as_admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin.access_token.clone();
        self.send(method, uri, Some(&token), body).await
    }

    /// Cart with two mugs turned into an order; returns the order id
    async fn place_order(&self) -> String {
        let (status, _) = self
            .as_customer("POST", "/api/v1/cart", Some(json!({ "product_id": "mug", "quantity": 2 })))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self.as_customer("POST", "/api/v1/orders", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["order"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;
    let (status, body) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = setup().await;
    let (status, body) = app.send("GET", "/api/v1/cart", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");
    assert_eq!(body["code"], 401);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = setup().await;
    let (status, _) = app
        .send("GET", "/api/v1/orders", Some("not.a.real.token.at-all"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_and_pay() {
    let app = setup().await;
    let order_id = app.place_order().await;

    let (status, cart) = app.as_customer("GET", "/api/v1/cart", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let (status, handoff) = app
        .as_customer("POST", "/api/v1/payments", Some(json!({ "order_id": order_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(handoff["transaction_id"], "PAYID-1");
    assert!(handoff["approval_url"].as_str().unwrap().contains("PAYID-1"));

    let (status, outcome) = app
        .as_customer("GET", "/api/v1/payments/verify?transaction_id=PAYID-1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "pending");
    assert_eq!(outcome["remote_status"], "APPROVED");

    let (status, outcome) = app
        .as_customer(
            "POST",
            "/api/v1/payments/capture",
            Some(json!({ "transaction_id": "PAYID-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["order_status"], "paid");

    let (status, order) = app
        .as_customer("GET", &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "paid");
    assert_eq!(order["total"]["amount"], 2000);
    assert_eq!(order["payments"][0]["status"], "completed");

    let (status, payments) = app.as_customer("GET", "/api/v1/payments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments["total"], 1);
}

#[tokio::test]
async fn test_second_payment_is_conflict() {
    let app = setup().await;
    let order_id = app.place_order().await;
    let body = json!({ "order_id": order_id });

    let (status, _) = app.as_customer("POST", "/api/v1/payments", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, err) = app.as_customer("POST", "/api/v1/payments", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "conflict");
}

#[tokio::test]
async fn test_initiate_requires_order_id() {
    let app = setup().await;
    let (status, err) = app
        .as_customer("POST", "/api/v1/payments", Some(json!({})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation");
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let app = setup().await;
    let (status, err) = app
        .as_customer("POST", "/api/v1/cart", Some(json!({ "product_id": "pen", "quantity": 3 })))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "conflict");
    assert_eq!(app.state.store.stock("pen").await, Some(1));
}

#[tokio::test]
async fn test_empty_cart_order_is_validation() {
    let app = setup().await;
    let (status, err) = app.as_customer("POST", "/api/v1/orders", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation");
}

#[tokio::test]
async fn test_cart_line_update_and_remove() {
    let app = setup().await;
    let (_, line) = app
        .as_customer("POST", "/api/v1/cart", Some(json!({ "product_id": "mug" })))
        .await;
    let line_id = line["line_id"].as_str().unwrap().to_string();
    assert_eq!(line["quantity"], 1);

    let (status, line) = app
        .as_customer(
            "PATCH",
            &format!("/api/v1/cart/{line_id}"),
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(line["quantity"], 4);

    let (status, _) = app
        .as_customer("DELETE", &format!("/api/v1/cart/{line_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .as_customer("DELETE", &format!("/api/v1/cart/{line_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_path_and_body_are_validation() {
    let app = setup().await;

    let (status, err) = app.as_customer("GET", "/api/v1/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation");

    let (status, err) = app
        .as_customer("POST", "/api/v1/cart", Some(json!({ "quantity": "many" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = setup().await;
    let order_id = app.place_order().await;

    let (status, err) = app.as_customer("GET", "/api/v1/admin/orders", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["kind"], "forbidden");

    let (status, page) = app.as_admin("GET", "/api/v1/admin/orders?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);

    // Admins may read any order
    let (status, _) = app
        .as_admin("GET", &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_sets_order_status() {
    let app = setup().await;
    let order_id = app.place_order().await;
    let uri = format!("/api/v1/admin/orders/{order_id}/status");

    let (status, err) = app
        .as_admin("PATCH", &uri, Some(json!({ "status": "teleported" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation");

    let (status, order) = app
        .as_admin("PATCH", &uri, Some(json!({ "status": "shipped" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "shipped");

    let (status, _) = app
        .as_customer("PATCH", &uri, Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .as_admin(
            "PATCH",
            &format!("/api/v1/admin/orders/{}/status", uuid::Uuid::new_v4()),
            Some(json!({ "status": "paid" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_users_order_is_not_found() {
    let app = setup().await;
    let stranger = UserRecord::new("Stranger", Role::User);
    let stranger_id = stranger.id;
    app.state.store.insert_user(stranger).await;
    let stranger = app.state.identity.rotate_refresh(stranger_id).await.unwrap();

    let order_id = app.place_order().await;

    let (status, _) = app
        .send(
            "GET",
            &format!("/api/v1/orders/{order_id}"),
            Some(&stranger.access_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/payments",
            Some(&stranger.access_token),
            Some(json!({ "order_id": order_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_reuse() {
    let app = setup().await;
    let old = app.customer.refresh_token.clone();

    let (status, pair) = app
        .send("POST", "/api/v1/auth/refresh", None, Some(json!({ "refresh_token": old })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(pair["refresh_token"], old.as_str());

    let (status, err) = app
        .send("POST", "/api/v1/auth/refresh", None, Some(json!({ "refresh_token": old })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["kind"], "unauthorized");
}

#[tokio::test]
async fn test_logout_revokes_refresh() {
    let app = setup().await;

    let (status, _) = app.as_customer("POST", "/api/v1/auth/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": app.customer.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
