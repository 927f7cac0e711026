//! # Cart
//!
//! Per-user cart lines and the snapshot reader that order creation
//! consumes. Stock checks here are advisory; the authoritative check is
//! the ledger's conditional decrement at checkout.

use crate::error::{ShopError, ShopResult};
use crate::product::{Currency, Price};
use crate::store::{MemoryStore, Tables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

/// A stored cart line; `(user_id, product_id)` is unique
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: String,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// A cart line joined with its product at read time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Price,
}

impl CartLine {
    pub fn total(&self) -> ShopResult<Price> {
        self.unit_price.times(self.quantity)
    }
}

/// Cart contents with a running total at current prices
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: Price,
}

/// Cart operations for authenticated users
#[derive(Clone)]
pub struct CartService {
    store: MemoryStore,
    currency: Currency,
}

impl CartService {
    pub fn new(store: MemoryStore, currency: Currency) -> Self {
        Self { store, currency }
    }

    /// Ordered `(product, quantity, unit price)` lines for a user, priced now.
    pub async fn snapshot(&self, user_id: Uuid) -> ShopResult<Vec<CartLine>> {
        self.store.read(|t| join_lines(t, user_id)).await
    }

    pub async fn view(&self, user_id: Uuid) -> ShopResult<CartView> {
        let items = self.snapshot(user_id).await?;
        let total = items
            .iter()
            .try_fold(Price::zero(self.currency), |acc, line| acc.checked_add(&line.total()?))?;
        Ok(CartView { items, total })
    }

    /// Add a product, merging into an existing line for the same product.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> ShopResult<CartLine> {
        if product_id.trim().is_empty() {
            return Err(ShopError::Validation("Product ID is required".to_string()));
        }
        require_quantity(quantity)?;

        let line = self
            .store
            .transaction(|tx| {
                let product = tx
                    .product(product_id)
                    .cloned()
                    .ok_or_else(|| ShopError::ProductNotFound {
                        product_id: product_id.to_string(),
                    })?;

                let existing = tx
                    .cart_items(user_id)
                    .into_iter()
                    .find(|item| item.product_id == product_id)
                    .cloned();

                let item = match existing {
                    Some(mut item) => {
                        item.quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                            ShopError::Validation("Quantity too large".to_string())
                        })?;
                        item
                    }
                    None => CartItem {
                        id: Uuid::new_v4(),
                        user_id,
                        product_id: product.id.clone(),
                        quantity,
                        created_at: Utc::now(),
                    },
                };

                if item.quantity > product.stock {
                    return Err(ShopError::InsufficientStock {
                        product_id: product.id.clone(),
                        product_name: product.name.clone(),
                        requested: item.quantity,
                        available: product.stock,
                    });
                }

                tx.insert_cart_item(item.clone());
                Ok(CartLine {
                    line_id: item.id,
                    product_id: product.id,
                    product_name: product.name,
                    quantity: item.quantity,
                    unit_price: product.price,
                })
            })
            .await?;

        info!(product_id = %line.product_id, quantity = line.quantity, "cart line saved");
        Ok(line)
    }

    /// Replace the quantity of one of the user's lines.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        quantity: u32,
    ) -> ShopResult<CartLine> {
        require_quantity(quantity)?;

        self.store
            .transaction(|tx| {
                let mut item = owned_line(tx, user_id, line_id)?;
                let product = tx
                    .product(&item.product_id)
                    .cloned()
                    .ok_or_else(|| ShopError::ProductNotFound {
                        product_id: item.product_id.clone(),
                    })?;

                if quantity > product.stock {
                    return Err(ShopError::InsufficientStock {
                        product_id: product.id,
                        product_name: product.name,
                        requested: quantity,
                        available: product.stock,
                    });
                }

                item.quantity = quantity;
                tx.insert_cart_item(item.clone());
                Ok(CartLine {
                    line_id: item.id,
                    product_id: product.id,
                    product_name: product.name,
                    quantity,
                    unit_price: product.price,
                })
            })
            .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_item(&self, user_id: Uuid, line_id: Uuid) -> ShopResult<()> {
        self.store
            .transaction(|tx| {
                owned_line(tx, user_id, line_id)?;
                tx.remove_cart_item(line_id);
                Ok(())
            })
            .await
    }

    /// Delete every line the user has; returns how many were removed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: Uuid) -> ShopResult<usize> {
        self.store
            .transaction(|tx| {
                let ids: Vec<Uuid> = tx.cart_items(user_id).iter().map(|i| i.id).collect();
                for id in &ids {
                    tx.remove_cart_item(*id);
                }
                Ok(ids.len())
            })
            .await
    }
}

fn require_quantity(quantity: u32) -> ShopResult<()> {
    if quantity < 1 {
        return Err(ShopError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn owned_line(tables: &Tables, user_id: Uuid, line_id: Uuid) -> ShopResult<CartItem> {
    tables
        .cart_item(line_id)
        .filter(|item| item.user_id == user_id)
        .cloned()
        .ok_or(ShopError::CartItemNotFound { line_id })
}

fn join_lines(tables: &Tables, user_id: Uuid) -> ShopResult<Vec<CartLine>> {
    tables
        .cart_items(user_id)
        .into_iter()
        .map(|item| {
            let product = tables
                .product(&item.product_id)
                .ok_or_else(|| ShopError::ProductNotFound {
                    product_id: item.product_id.clone(),
                })?;
            Ok(CartLine {
                line_id: item.id,
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            })
        })
        .collect()
}
