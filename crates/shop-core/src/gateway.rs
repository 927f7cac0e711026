//! # Payment Gateway Trait
//!
//! The narrow seam between the reconciliation state machine and the
//! external payment provider. The real implementation lives in
//! `shop-paypal`; tests drive the state machine through scripted fakes.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          PaymentGateway (trait)             │
//! │  ├── create_intent()                        │
//! │  ├── get_status()                           │
//! │  └── capture()                              │
//! └─────────────────────────────────────────────┘
//!                      ▲
//!          ┌───────────┴───────────┐
//!  ┌───────┴───────┐       ┌───────┴───────┐
//!  │ PayPalGateway │       │  test fakes   │
//!  └───────────────┘       └───────────────┘
//! ```

use crate::error::ShopResult;
use crate::payment::RemoteStatus;
use crate::product::Price;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A remote payment intent awaiting buyer approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway transaction id
    pub transaction_id: String,
    /// Where the buyer approves the payment out-of-band
    pub approval_url: String,
}

/// Operations the reconciliation state machine needs from a provider.
///
/// Every call is a network round trip that may fail transiently. Failures
/// are reported as `ShopError::Upstream`; the caller bounds each call with
/// its own timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a remote intent for `amount`, tagged with our order reference.
    ///
    /// `idempotency_key` identifies this payment attempt; repeating the call
    /// with the same key must not create a second remote intent.
    async fn create_intent(
        &self,
        amount: &Price,
        order_ref: &str,
        idempotency_key: &str,
    ) -> ShopResult<PaymentIntent>;

    /// Current remote status of a transaction.
    async fn get_status(&self, transaction_id: &str) -> ShopResult<RemoteStatus>;

    /// Capture an approved transaction, returning the resulting remote status.
    async fn capture(&self, transaction_id: &str) -> ShopResult<RemoteStatus>;

    /// Get the provider name (for logging and error messages).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type SharedGateway = Arc<dyn PaymentGateway>;
