//! # shop-paypal
//!
//! PayPal payment gateway for the storefront.
//!
//! Implements `shop_core::PaymentGateway` against the PayPal Orders v2
//! REST API:
//!
//! - `create_intent` → `POST /v2/checkout/orders` (intent `CAPTURE`),
//!   returning the buyer's `approve` link
//! - `get_status` → `GET /v2/checkout/orders/{id}`
//! - `capture` → `POST /v2/checkout/orders/{id}/capture`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shop_paypal::PayPalGateway;
//!
//! let gateway = Arc::new(PayPalGateway::from_env()?);
//! let payments = PaymentReconciler::new(store, gateway, settings.gateway_timeout);
//! ```

pub mod client;
pub mod config;

pub use client::PayPalGateway;
pub use config::{PayPalConfig, PayPalMode};
