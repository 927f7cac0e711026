//! # Order Creation
//!
//! Turns a cart snapshot into a durable order. The order row, every stock
//! reservation and the cart clearing commit as one unit; if any line cannot
//! be reserved nothing is written at all.

use crate::cart::CartService;
use crate::error::{ShopError, ShopResult};
use crate::order::{LineItem, Order, OrderDetails, OrderReceipt, OrderStatus};
use crate::product::Currency;
use crate::query::{Page, PageRequest};
use crate::store::{MemoryStore, Tables};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order creation, lookup and administrative status changes
#[derive(Clone)]
pub struct OrderService {
    store: MemoryStore,
    carts: CartService,
    currency: Currency,
}

impl OrderService {
    pub fn new(store: MemoryStore, carts: CartService, currency: Currency) -> Self {
        Self {
            store,
            carts,
            currency,
        }
    }

    /// Convert the user's cart into a pending order.
    ///
    /// Prices come from the snapshot taken before the transaction starts;
    /// stock is checked live, inside the transaction, by the ledger. If any
    /// snapshot line was removed or changed in between, the order is refused
    /// with [`ShopError::CartChanged`] and nothing is written.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_order(&self, user_id: Uuid) -> ShopResult<OrderReceipt> {
        let lines = self.carts.snapshot(user_id).await?;
        if lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }

        let order = Order::from_lines(
            user_id,
            lines.iter().map(LineItem::from_cart_line).collect(),
            self.currency,
        )?;

        let result = self
            .store
            .transaction(|tx| {
                for line in &lines {
                    let unchanged = tx.cart_item(line.line_id).is_some_and(|item| {
                        item.user_id == user_id
                            && item.product_id == line.product_id
                            && item.quantity == line.quantity
                    });
                    if !unchanged {
                        return Err(ShopError::CartChanged);
                    }
                }

                tx.insert_order(order.clone());
                for line in &lines {
                    tx.reserve(&line.product_id, line.quantity)?;
                }
                for line in &lines {
                    tx.remove_cart_item(line.line_id);
                }
                Ok(())
            })
            .await;

        if let Err(e) = result {
            warn!(error = %e, "order creation aborted");
            return Err(e);
        }

        info!(
            order_id = %order.id,
            items = order.item_count(),
            total = %order.total.display(),
            "order created"
        );
        Ok(OrderReceipt {
            order,
            items: lines,
        })
    }

    /// Fetch an order with its payments. Non-admins only see their own.
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        is_admin: bool,
    ) -> ShopResult<OrderDetails> {
        self.store
            .read(|t| {
                t.order(order_id)
                    .filter(|o| is_admin || o.user_id == user_id)
                    .map(|o| details(t, o))
                    .ok_or(ShopError::OrderNotFound { order_id })
            })
            .await
    }

    /// The caller's orders, newest first
    pub async fn list_user_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> ShopResult<Page<OrderDetails>> {
        Ok(self
            .store
            .read(|t| page.apply(select(t, Some(user_id), status)))
            .await)
    }

    /// Every order, newest first (admin)
    pub async fn list_orders(
        &self,
        page: PageRequest,
        status: Option<OrderStatus>,
    ) -> ShopResult<Page<OrderDetails>> {
        Ok(self.store.read(|t| page.apply(select(t, None, status))).await)
    }

    /// Administrative status override
    #[instrument(skip(self))]
    pub async fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> ShopResult<OrderDetails> {
        let details = self
            .store
            .transaction(|tx| {
                let order = tx.set_order_status(order_id, status)?;
                Ok(details(tx, &order))
            })
            .await?;

        info!(%order_id, %status, "order status updated");
        Ok(details)
    }
}

fn details(tables: &Tables, order: &Order) -> OrderDetails {
    OrderDetails {
        order: order.clone(),
        payments: tables.payments_for_order(order.id),
    }
}

fn select(tables: &Tables, user_id: Option<Uuid>, status: Option<OrderStatus>) -> Vec<OrderDetails> {
    let mut orders: Vec<&Order> = tables
        .orders()
        .filter(|o| user_id.map_or(true, |u| o.user_id == u))
        .filter(|o| status.map_or(true, |s| o.status == s))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders.into_iter().map(|o| details(tables, o)).collect()
}
