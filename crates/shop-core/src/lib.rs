//! # shop-core
//!
//! Order and payment fulfillment core for the storefront.
//!
//! This crate provides:
//! - `MemoryStore` and `Transaction` for all-or-nothing writes
//! - The inventory ledger (`Transaction::reserve`), a conditional stock decrement
//! - `OrderService` to turn a cart snapshot into an order atomically
//! - `PaymentReconciler`, the payment state machine over a `PaymentGateway`
//! - `TokenIssuer` to resolve bearer credentials and rotate refresh credentials
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CartService, MemoryStore, OrderService, PaymentReconciler, ShopSettings};
//!
//! let store = MemoryStore::new();
//! let settings = ShopSettings::from_env()?;
//! let carts = CartService::new(store.clone(), settings.currency);
//! let orders = OrderService::new(store.clone(), carts.clone(), settings.currency);
//! let payments = PaymentReconciler::new(store.clone(), gateway, settings.gateway_timeout);
//!
//! let receipt = orders.create_order(user_id).await?;
//! let handoff = payments.initiate_payment(user_id, receipt.order.id).await?;
//! // Redirect buyer to handoff.approval_url, then:
//! let outcome = payments.capture_payment(user_id, &handoff.transaction_id).await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod product;
pub mod query;
pub mod reconcile;
pub mod store;

// Re-exports for convenience
pub use cart::{CartItem, CartLine, CartService, CartView};
pub use checkout::OrderService;
pub use config::{IdentityConfig, ShopSettings};
pub use error::{ErrorKind, ShopError, ShopResult};
pub use gateway::{PaymentGateway, PaymentIntent, SharedGateway};
pub use identity::{Principal, Role, TokenIssuer, TokenPair, UserRecord};
pub use inventory::Reservation;
pub use order::{LineItem, Order, OrderDetails, OrderReceipt, OrderStatus};
pub use payment::{Payment, PaymentHandoff, PaymentOutcome, PaymentStatus, RemoteStatus};
pub use product::{Currency, Price, Product, ProductCatalog};
pub use query::{Page, PageRequest};
pub use reconcile::{PaymentDetails, PaymentReconciler};
pub use store::{MemoryStore, Tables, Transaction};
