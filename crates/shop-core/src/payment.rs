//! # Payment Types
//!
//! Local payment records and the mapping from the gateway's status
//! vocabulary onto the local three-state taxonomy.

use crate::error::ShopError;
use crate::order::{Order, OrderStatus};
use crate::product::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Intent created, awaiting buyer approval or capture
    Pending,
    /// Funds captured (terminal)
    Completed,
    /// Attempt abandoned (terminal; the order may be paid by a new attempt)
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Pending and completed payments block new attempts for the same order
    pub fn is_active(&self) -> bool {
        !matches!(self, PaymentStatus::Failed)
    }

    /// Map a gateway status onto the local taxonomy.
    ///
    /// The mapping is total and deterministic: `COMPLETED` is completed,
    /// `SAVED`, `APPROVED` and `PAYER_ACTION_REQUIRED` are still pending,
    /// everything else (`VOIDED`, `CREATED`, unknown values) is failed.
    pub fn from_remote(remote: &RemoteStatus) -> Self {
        match remote.as_str() {
            "COMPLETED" => PaymentStatus::Completed,
            "SAVED" | "APPROVED" | "PAYER_ACTION_REQUIRED" => PaymentStatus::Pending,
            _ => PaymentStatus::Failed,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ShopError::Validation(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// Opaque status string as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteStatus(String);

impl RemoteStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_local(&self) -> PaymentStatus {
        PaymentStatus::from_remote(self)
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment attempt for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: Price,
    pub status: PaymentStatus,
    /// Gateway-issued transaction id
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A fresh pending payment for the full order total
    pub fn pending(order: &Order, transaction_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            amount: order.total,
            status: PaymentStatus::Pending,
            transaction_id: transaction_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returned by `initiate_payment`: where to send the buyer
#[derive(Debug, Clone, Serialize)]
pub struct PaymentHandoff {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub approval_url: String,
}

/// Returned by `verify_payment` and `capture_payment`
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// Gateway status seen on this call; absent when the gateway was not contacted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<RemoteStatus>,
    pub order_id: Uuid,
    pub order_status: OrderStatus,
}
