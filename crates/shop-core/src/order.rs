//! # Order Types
//!
//! Orders and their frozen line-item snapshots.

use crate::cart::CartLine;
use crate::error::{ShopError, ShopResult};
use crate::payment::Payment;
use crate::product::{Currency, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ShopError::Validation(
                    "Valid status is required: pending, paid, shipped, delivered, cancelled"
                        .to_string(),
                )
            })
    }
}

/// A line item as captured at checkout time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product ID
    pub product_id: String,

    /// Product name (denormalized for receipts)
    pub name: String,

    /// Unit price captured in the cart snapshot
    pub unit_price: Price,

    /// Quantity
    pub quantity: u32,
}

impl LineItem {
    pub fn from_cart_line(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.product_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }

    /// Calculate the total price for this line item
    pub fn total(&self) -> ShopResult<Price> {
        self.unit_price.times(self.quantity)
    }
}

/// A durable order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Owner
    pub user_id: Uuid,

    /// Frozen snapshot of what was bought
    pub line_items: Vec<LineItem>,

    /// Sum of line totals at creation time; never recomputed
    pub total: Price,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from snapshot lines, freezing the total.
    pub fn from_lines(user_id: Uuid, line_items: Vec<LineItem>, currency: Currency) -> ShopResult<Self> {
        let total = line_items
            .iter()
            .try_fold(Price::zero(currency), |acc, item| acc.checked_add(&item.total()?))?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            line_items,
            total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.line_items.iter().map(|i| i.quantity).sum()
    }
}

/// What `create_order` hands back for receipt display
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub items: Vec<CartLine>,
}

/// An order together with every payment attempt made for it
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub payments: Vec<Payment>,
}
