//! # In-Memory Store
//!
//! Transactional in-memory persistence for products, carts, orders,
//! payments and user credential slots.
//!
//! All writes go through [`MemoryStore::transaction`]. The closure runs with
//! exclusive access to every table, each mutation records an undo entry, and
//! an `Err` (or a panic) replays the undo log before the lock is released.
//! Readers therefore only ever see committed state: an order is never
//! visible without its stock decrement, and a completed payment is never
//! visible next to an unpaid order.
//!
//! Critical sections are pure in-memory work. Gateway calls and any other
//! I/O happen outside of them, so requests only contend for the store for
//! the duration of a few map operations.

use crate::cart::CartItem;
use crate::error::{ShopError, ShopResult};
use crate::identity::UserRecord;
use crate::order::{Order, OrderStatus};
use crate::payment::{Payment, PaymentStatus};
use crate::product::Product;
use chrono::Utc;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Every table the store holds
#[derive(Debug, Default)]
pub struct Tables {
    pub(crate) products: HashMap<String, Product>,
    pub(crate) cart_items: HashMap<Uuid, CartItem>,
    pub(crate) orders: HashMap<Uuid, Order>,
    pub(crate) payments: HashMap<Uuid, Payment>,
    pub(crate) users: HashMap<Uuid, UserRecord>,
}

impl Tables {
    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn order(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn payment(&self, payment_id: Uuid) -> Option<&Payment> {
        self.payments.get(&payment_id)
    }

    pub fn payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    pub fn payment_by_transaction(&self, transaction_id: &str) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.transaction_id == transaction_id)
    }

    /// All attempts for an order, oldest first
    pub fn payments_for_order(&self, order_id: Uuid) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        payments
    }

    /// The pending or completed payment for an order, if any
    pub fn active_payment_for_order(&self, order_id: Uuid) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.order_id == order_id && p.status.is_active())
    }

    /// A user's cart lines, oldest first
    pub fn cart_items(&self, user_id: Uuid) -> Vec<&CartItem> {
        let mut items: Vec<&CartItem> = self
            .cart_items
            .values()
            .filter(|item| item.user_id == user_id)
            .collect();
        items.sort_by_key(|item| item.created_at);
        items
    }

    pub fn cart_item(&self, line_id: Uuid) -> Option<&CartItem> {
        self.cart_items.get(&line_id)
    }

    pub fn user(&self, user_id: Uuid) -> Option<&UserRecord> {
        self.users.get(&user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }
}

enum Undo {
    Release { product_id: String, quantity: u32 },
    RemoveOrder(Uuid),
    RestoreOrder(Order),
    RemovePayment(Uuid),
    RestorePayment(Payment),
    RemoveCartItem(Uuid),
    RestoreCartItem(CartItem),
    RestoreUser(UserRecord),
}

/// A unit of work with exclusive access to the tables.
///
/// Dropped without [`Transaction::commit`] it rolls back.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn new(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }

    pub(crate) fn tables_mut(&mut self) -> &mut Tables {
        self.tables
    }

    pub(crate) fn record_reservation(&mut self, product_id: &str, quantity: u32) {
        self.undo.push(Undo::Release {
            product_id: product_id.to_string(),
            quantity,
        });
    }

    pub fn insert_order(&mut self, order: Order) {
        self.undo.push(Undo::RemoveOrder(order.id));
        self.tables.orders.insert(order.id, order);
    }

    /// Overwrite an order's status, returning the updated order
    pub fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> ShopResult<Order> {
        let order = self
            .tables
            .orders
            .get_mut(&order_id)
            .ok_or(ShopError::OrderNotFound { order_id })?;
        self.undo.push(Undo::RestoreOrder(order.clone()));
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    /// Insert a payment, refusing a second active payment for the same order
    pub fn insert_payment(&mut self, payment: Payment) -> ShopResult<()> {
        if payment.status.is_active() && self.active_payment_for_order(payment.order_id).is_some() {
            return Err(ShopError::PaymentAlreadyActive {
                order_id: payment.order_id,
            });
        }
        self.undo.push(Undo::RemovePayment(payment.id));
        self.tables.payments.insert(payment.id, payment);
        Ok(())
    }

    /// Overwrite a payment's status, returning the updated payment
    pub fn set_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> ShopResult<Payment> {
        let payment = self
            .tables
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| ShopError::PaymentNotFound {
                reference: payment_id.to_string(),
            })?;
        self.undo.push(Undo::RestorePayment(payment.clone()));
        payment.status = status;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    pub fn insert_cart_item(&mut self, item: CartItem) {
        match self.tables.cart_items.insert(item.id, item.clone()) {
            Some(previous) => self.undo.push(Undo::RestoreCartItem(previous)),
            None => self.undo.push(Undo::RemoveCartItem(item.id)),
        }
    }

    pub fn remove_cart_item(&mut self, line_id: Uuid) -> Option<CartItem> {
        let removed = self.tables.cart_items.remove(&line_id)?;
        self.undo.push(Undo::RestoreCartItem(removed.clone()));
        Some(removed)
    }

    pub fn set_refresh_token(&mut self, user_id: Uuid, token: Option<String>) -> ShopResult<()> {
        let user = self
            .tables
            .users
            .get_mut(&user_id)
            .ok_or(ShopError::UserNotFound { user_id })?;
        self.undo.push(Undo::RestoreUser(user.clone()));
        user.refresh_token = token;
        Ok(())
    }

    fn rollback(&mut self) {
        debug!(entries = self.undo.len(), "rolling back transaction");
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Release {
                    product_id,
                    quantity,
                } => {
                    if let Err(e) = self.tables.release_stock(&product_id, quantity) {
                        warn!(%product_id, error = %e, "stock release failed during rollback");
                    }
                }
                Undo::RemoveOrder(id) => {
                    self.tables.orders.remove(&id);
                }
                Undo::RestoreOrder(order) => {
                    self.tables.orders.insert(order.id, order);
                }
                Undo::RemovePayment(id) => {
                    self.tables.payments.remove(&id);
                }
                Undo::RestorePayment(payment) => {
                    self.tables.payments.insert(payment.id, payment);
                }
                Undo::RemoveCartItem(id) => {
                    self.tables.cart_items.remove(&id);
                }
                Undo::RestoreCartItem(item) => {
                    self.tables.cart_items.insert(item.id, item);
                }
                Undo::RestoreUser(user) => {
                    self.tables.users.insert(user.id, user);
                }
            }
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        self.tables
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

/// Shared handle to the in-memory tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one all-or-nothing unit.
    ///
    /// `Ok` commits every mutation made through the transaction; `Err`
    /// discards all of them.
    pub async fn transaction<T, F>(&self, f: F) -> ShopResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> ShopResult<T>,
    {
        let mut guard = self.tables.write().await;
        let mut tx = Transaction::new(&mut guard);
        let value = f(&mut tx)?;
        tx.commit();
        Ok(value)
    }

    /// Read a consistent view of committed state
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Tables) -> T,
    {
        let guard = self.tables.read().await;
        f(&guard)
    }

    /// Insert or replace catalog entries (catalog management is external)
    pub async fn seed_products(&self, products: impl IntoIterator<Item = Product>) {
        let mut guard = self.tables.write().await;
        for product in products {
            guard.products.insert(product.id.clone(), product);
        }
    }

    /// Insert or replace a user record (registration is external)
    pub async fn insert_user(&self, user: UserRecord) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Current stock for a product
    pub async fn stock(&self, product_id: &str) -> Option<u32> {
        self.read(|t| t.product(product_id).map(|p| p.stock)).await
    }

    /// Hold the write lock so tests can queue operations behind it
    #[cfg(test)]
    pub(crate) async fn hold_write(&self) -> tokio::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }
}
