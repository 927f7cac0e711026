//! # Inventory Ledger
//!
//! Per-product stock counters. `reserve` is a conditional decrement: the
//! comparison against available stock and the decrement happen in the same
//! exclusive section of a [`Transaction`], never against a value read
//! earlier in the request. Every reservation is journalled so that an
//! aborted transaction releases exactly what it took.

use crate::error::{ShopError, ShopResult};
use crate::store::{Tables, Transaction};
use tracing::debug;

/// A successful stock reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub product_id: String,
    pub quantity: u32,
    /// Stock left after this reservation
    pub remaining: u32,
}

impl Transaction<'_> {
    /// Decrement stock by `quantity` only if at least that much is available.
    pub fn reserve(&mut self, product_id: &str, quantity: u32) -> ShopResult<Reservation> {
        if quantity == 0 {
            return Err(ShopError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let product = self
            .tables_mut()
            .products
            .get_mut(product_id)
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;

        if product.stock < quantity {
            return Err(ShopError::InsufficientStock {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        let remaining = product.stock;
        self.record_reservation(product_id, quantity);

        debug!(%product_id, quantity, remaining, "stock reserved");
        Ok(Reservation {
            product_id: product_id.to_string(),
            quantity,
            remaining,
        })
    }
}

impl Tables {
    /// Give back stock taken by a reservation that is being undone.
    pub(crate) fn release_stock(&mut self, product_id: &str, quantity: u32) -> ShopResult<()> {
        let product = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| ShopError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or_else(|| ShopError::invariant(format!("stock overflow releasing {product_id}")))?;
        Ok(())
    }
}
