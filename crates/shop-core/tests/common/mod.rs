//! Shared fixtures for shop-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use shop_core::{
    CartService, Currency, MemoryStore, OrderService, PaymentGateway, PaymentIntent,
    PaymentReconciler, Price, Product, RemoteStatus, ShopError, ShopResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// How the fake answers a capture call
#[derive(Debug, Clone)]
pub enum CaptureBehavior {
    Status(&'static str),
    TransportError,
    Hang,
}

#[derive(Debug)]
struct Script {
    next_id: u32,
    fail_create: bool,
    hang_create: bool,
    hold_create: bool,
    hold_capture: bool,
    remote_statuses: HashMap<String, String>,
    capture: CaptureBehavior,
    create_calls: usize,
    status_calls: usize,
    capture_calls: usize,
}

/// Gateway double whose answers are set by the test
pub struct ScriptedGateway {
    script: Mutex<Script>,
    gate: watch::Sender<bool>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                next_id: 0,
                fail_create: false,
                hang_create: false,
                hold_create: false,
                hold_capture: false,
                remote_statuses: HashMap::new(),
                capture: CaptureBehavior::Status("COMPLETED"),
                create_calls: 0,
                status_calls: 0,
                capture_calls: 0,
            }),
            gate: watch::Sender::new(false),
        }
    }

    pub fn fail_create(&self, fail: bool) {
        self.script.lock().unwrap().fail_create = fail;
    }

    pub fn hang_create(&self, hang: bool) {
        self.script.lock().unwrap().hang_create = hang;
    }

    /// Park create calls until [`ScriptedGateway::release`]
    pub fn hold_create(&self) {
        self.script.lock().unwrap().hold_create = true;
    }

    /// Park capture calls until [`ScriptedGateway::release`]
    pub fn hold_capture(&self) {
        self.script.lock().unwrap().hold_capture = true;
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn wait_for_release(&self) {
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
    }

    pub fn set_remote_status(&self, transaction_id: &str, status: &str) {
        self.script
            .lock()
            .unwrap()
            .remote_statuses
            .insert(transaction_id.to_string(), status.to_string());
    }

    pub fn set_capture(&self, behavior: CaptureBehavior) {
        self.script.lock().unwrap().capture = behavior;
    }

    pub fn create_calls(&self) -> usize {
        self.script.lock().unwrap().create_calls
    }

    pub fn status_calls(&self) -> usize {
        self.script.lock().unwrap().status_calls
    }

    pub fn capture_calls(&self) -> usize {
        self.script.lock().unwrap().capture_calls
    }
}

fn transport_error() -> ShopError {
    ShopError::Upstream {
        provider: "scripted".to_string(),
        message: "connection reset".to_string(),
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(
        &self,
        _amount: &Price,
        _order_ref: &str,
        _idempotency_key: &str,
    ) -> ShopResult<PaymentIntent> {
        let (hang, hold) = {
            let mut script = self.script.lock().unwrap();
            script.create_calls += 1;
            if script.fail_create {
                return Err(transport_error());
            }
            (script.hang_create, script.hold_create)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if hold {
            self.wait_for_release().await;
        }

        let mut script = self.script.lock().unwrap();
        script.next_id += 1;
        let transaction_id = format!("TX-{:04}", script.next_id);
        script
            .remote_statuses
            .insert(transaction_id.clone(), "CREATED".to_string());
        Ok(PaymentIntent {
            approval_url: format!("https://gateway.test/approve/{transaction_id}"),
            transaction_id,
        })
    }

    async fn get_status(&self, transaction_id: &str) -> ShopResult<RemoteStatus> {
        let mut script = self.script.lock().unwrap();
        script.status_calls += 1;
        script
            .remote_statuses
            .get(transaction_id)
            .map(RemoteStatus::new)
            .ok_or_else(|| ShopError::Upstream {
                provider: "scripted".to_string(),
                message: "HTTP 404".to_string(),
            })
    }

    async fn capture(&self, transaction_id: &str) -> ShopResult<RemoteStatus> {
        let (behavior, hold) = {
            let mut script = self.script.lock().unwrap();
            script.capture_calls += 1;
            (script.capture.clone(), script.hold_capture)
        };
        if hold {
            self.wait_for_release().await;
        }
        match behavior {
            CaptureBehavior::Status(status) => {
                self.set_remote_status(transaction_id, status);
                Ok(RemoteStatus::new(status))
            }
            CaptureBehavior::TransportError => Err(transport_error()),
            CaptureBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub carts: CartService,
    pub orders: OrderService,
    pub payments: PaymentReconciler,
    pub gateway: Arc<ScriptedGateway>,
}

pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn usd(cents: i64) -> Price {
    Price::from_cents(cents, Currency::USD)
}

/// Store seeded with three products:
/// `a` ($10.00, 5 left), `b` ($4.00, 1 left), `c` ($7.50, 3 left)
pub async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    store
        .seed_products([
            Product::new("a", "Product A", usd(1000), 5),
            Product::new("b", "Product B", usd(400), 1),
            Product::new("c", "Product C", usd(750), 3),
        ])
        .await;

    let gateway = Arc::new(ScriptedGateway::new());
    let carts = CartService::new(store.clone(), Currency::USD);
    let orders = OrderService::new(store.clone(), carts.clone(), Currency::USD);
    let payments = PaymentReconciler::new(store.clone(), gateway.clone(), GATEWAY_TIMEOUT);

    Fixture {
        store,
        carts,
        orders,
        payments,
        gateway,
    }
}

impl Fixture {
    /// A pending order for a fresh user buying one unit of `a`
    pub async fn pending_order(&self) -> (Uuid, Uuid) {
        let user = Uuid::new_v4();
        self.carts.add_item(user, "a", 1).await.unwrap();
        let receipt = self.orders.create_order(user).await.unwrap();
        (user, receipt.order.id)
    }

    pub async fn order_count(&self) -> usize {
        self.store.read(|t| t.orders().count()).await
    }
}
