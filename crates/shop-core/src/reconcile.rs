//! # Payment Reconciliation
//!
//! Drives a payment through `pending → completed` or `pending → failed`
//! against the external gateway, and projects the outcome onto the order:
//! an order becomes `paid` in the same transaction that completes its
//! payment, never separately.
//!
//! Gateway calls run outside any store transaction and are bounded by a
//! timeout. A timeout is a retryable upstream failure, never an implied
//! success.

use crate::error::{ShopError, ShopResult};
use crate::gateway::SharedGateway;
use crate::order::{Order, OrderStatus};
use crate::payment::{Payment, PaymentHandoff, PaymentOutcome, PaymentStatus, RemoteStatus};
use crate::query::{Page, PageRequest};
use crate::store::{MemoryStore, Transaction};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// A payment together with the order it pays for
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub order: Order,
}

/// The payment state machine
#[derive(Clone)]
pub struct PaymentReconciler {
    store: MemoryStore,
    gateway: SharedGateway,
    timeout: Duration,
    in_flight: CaptureClaims,
}

impl PaymentReconciler {
    pub fn new(store: MemoryStore, gateway: SharedGateway, timeout: Duration) -> Self {
        Self {
            store,
            gateway,
            timeout,
            in_flight: CaptureClaims::default(),
        }
    }

    fn provider(&self) -> String {
        self.gateway.provider_name().to_string()
    }

    /// Await a gateway call, converting an elapsed deadline into an upstream error.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = ShopResult<T>>,
    ) -> ShopResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "gateway call timed out");
                Err(ShopError::GatewayTimeout {
                    provider: self.provider(),
                    operation,
                })
            }
        }
    }

    /// Start paying for an order: create a remote intent and record a
    /// pending payment for it.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn initiate_payment(&self, user_id: Uuid, order_id: Uuid) -> ShopResult<PaymentHandoff> {
        let order = self
            .store
            .read(|t| {
                let order = t
                    .order(order_id)
                    .filter(|o| o.user_id == user_id)
                    .ok_or(ShopError::OrderNotFound { order_id })?;
                ensure_payable(t.active_payment_for_order(order_id), order)?;
                Ok::<_, ShopError>(order.clone())
            })
            .await?;

        let attempt_id = Uuid::new_v4();
        let intent = self
            .bounded(
                "create_intent",
                self.gateway.create_intent(
                    &order.total,
                    &order.id.to_string(),
                    &attempt_id.to_string(),
                ),
            )
            .await
            .map_err(|e| {
                error!(error = %e, "failed to create payment intent");
                e
            })?;

        let payment = Payment {
            id: attempt_id,
            ..Payment::pending(&order, intent.transaction_id.clone())
        };
        let payment_id = payment.id;

        // Preconditions are checked again under the write lock; a concurrent
        // initiate may have won since the read above.
        self.store
            .transaction(|tx| {
                let order = tx
                    .order(order_id)
                    .ok_or(ShopError::OrderNotFound { order_id })?;
                ensure_payable(tx.active_payment_for_order(order_id), order)?;
                tx.insert_payment(payment)
            })
            .await
            .map_err(|e| {
                warn!(
                    transaction_id = %intent.transaction_id,
                    error = %e,
                    "payment not recorded; remote intent left unused"
                );
                e
            })?;

        info!(%payment_id, transaction_id = %intent.transaction_id, "payment initiated");
        Ok(PaymentHandoff {
            payment_id,
            transaction_id: intent.transaction_id,
            approval_url: intent.approval_url,
        })
    }

    /// Pull the gateway's view of a transaction and persist any change.
    ///
    /// Safe to repeat: the same remote status always maps to the same
    /// local status, and an unchanged status writes nothing.
    #[instrument(skip(self))]
    pub async fn verify_payment(&self, transaction_id: &str) -> ShopResult<PaymentOutcome> {
        require_transaction_id(transaction_id)?;

        let payment = self
            .store
            .read(|t| t.payment_by_transaction(transaction_id).cloned())
            .await
            .ok_or_else(|| ShopError::PaymentNotFound {
                reference: transaction_id.to_string(),
            })?;

        let remote = self
            .bounded("get_status", self.gateway.get_status(transaction_id))
            .await?;
        let mapped = remote.to_local();

        let (payment, order) = self
            .store
            .transaction(|tx| apply_remote(tx, payment.id, mapped))
            .await?;

        info!(
            payment_id = %payment.id,
            remote_status = %remote,
            status = %payment.status,
            "payment verified"
        );
        Ok(outcome(&payment, &order, Some(remote)))
    }

    /// Finalize an approved payment.
    ///
    /// An already completed payment returns immediately without touching
    /// the gateway. A failed payment is sent to the gateway again, since
    /// the buyer may have approved it after a verify saw it unapproved; it
    /// is only retried while no other payment is active for the order. Any
    /// capture failure marks a pending payment failed and leaves the order
    /// as it was, so a new payment can be initiated.
    ///
    /// Only one capture per payment runs at a time; a second concurrent
    /// call gets [`ShopError::CaptureInProgress`].
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn capture_payment(&self, user_id: Uuid, transaction_id: &str) -> ShopResult<PaymentOutcome> {
        require_transaction_id(transaction_id)?;

        let payment_id = self
            .store
            .read(|t| {
                t.payment_by_transaction(transaction_id)
                    .filter(|p| p.user_id == user_id)
                    .map(|p| p.id)
            })
            .await
            .ok_or_else(|| ShopError::PaymentNotFound {
                reference: transaction_id.to_string(),
            })?;

        let _claim = self
            .in_flight
            .claim(payment_id)
            .ok_or(ShopError::CaptureInProgress { payment_id })?;

        // Read under the claim so a capture that just finished is seen.
        let (payment, order) = self
            .store
            .read(|t| {
                let payment = t.payment(payment_id).cloned().ok_or_else(|| {
                    ShopError::PaymentNotFound {
                        reference: transaction_id.to_string(),
                    }
                })?;
                let order = t.order(payment.order_id).cloned().ok_or_else(|| {
                    ShopError::invariant(format!("payment {payment_id} has no order"))
                })?;
                match payment.status {
                    PaymentStatus::Completed | PaymentStatus::Pending => {}
                    PaymentStatus::Failed => {
                        ensure_payable(t.active_payment_for_order(order.id), &order)?
                    }
                }
                Ok::<_, ShopError>((payment, order))
            })
            .await?;

        if payment.status == PaymentStatus::Completed {
            info!(%payment_id, "payment already completed");
            return Ok(outcome(&payment, &order, None));
        }

        if order.status == OrderStatus::Cancelled {
            return Err(ShopError::OrderNotPayable {
                order_id: order.id,
                status: order.status,
            });
        }

        let failure = match self
            .bounded("capture", self.gateway.capture(transaction_id))
            .await
        {
            Ok(remote) if remote.to_local() == PaymentStatus::Completed => {
                let (payment, order) = self
                    .store
                    .transaction(|tx| apply_remote(tx, payment_id, PaymentStatus::Completed))
                    .await?;
                info!(%payment_id, order_id = %order.id, "payment captured");
                return Ok(outcome(&payment, &order, Some(remote)));
            }
            Ok(remote) => ShopError::Upstream {
                provider: self.provider(),
                message: format!("capture did not complete (status {remote})"),
            },
            Err(e) => e,
        };

        error!(%payment_id, error = %failure, "payment capture failed");
        self.mark_failed(payment_id).await;
        Err(failure)
    }

    /// Record a failed capture. The capture error is what the caller sees,
    /// so a problem here is only logged.
    async fn mark_failed(&self, payment_id: Uuid) {
        let result = self
            .store
            .transaction(|tx| match tx.payment(payment_id).map(|p| p.status) {
                Some(PaymentStatus::Pending) => {
                    tx.set_payment_status(payment_id, PaymentStatus::Failed)?;
                    Ok(())
                }
                Some(_) => Ok(()),
                None => Err(ShopError::PaymentNotFound {
                    reference: payment_id.to_string(),
                }),
            })
            .await;

        if let Err(e) = result {
            error!(%payment_id, error = %e, "could not mark payment failed");
        }
    }

    /// A single payment with its order (admin)
    pub async fn get_payment(&self, payment_id: Uuid) -> ShopResult<PaymentDetails> {
        self.store
            .read(|t| {
                let payment = t.payment(payment_id).ok_or_else(|| ShopError::PaymentNotFound {
                    reference: payment_id.to_string(),
                })?;
                let order = t.order(payment.order_id).ok_or_else(|| {
                    ShopError::invariant(format!("payment {payment_id} has no order"))
                })?;
                Ok(PaymentDetails {
                    payment: payment.clone(),
                    order: order.clone(),
                })
            })
            .await
    }

    /// The caller's payments, newest first
    pub async fn list_user_payments(
        &self,
        user_id: Uuid,
        page: PageRequest,
        status: Option<PaymentStatus>,
    ) -> ShopResult<Page<PaymentDetails>> {
        self.store
            .read(|t| {
                let mut payments: Vec<&Payment> = t
                    .payments()
                    .filter(|p| p.user_id == user_id)
                    .filter(|p| status.map_or(true, |s| p.status == s))
                    .collect();
                payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

                let details = payments
                    .into_iter()
                    .map(|p| {
                        let order = t.order(p.order_id).ok_or_else(|| {
                            ShopError::invariant(format!("payment {} has no order", p.id))
                        })?;
                        Ok(PaymentDetails {
                            payment: p.clone(),
                            order: order.clone(),
                        })
                    })
                    .collect::<ShopResult<Vec<_>>>()?;
                Ok(page.apply(details))
            })
            .await
    }
}

/// Payments with a capture call outstanding, shared by every clone of the
/// reconciler
#[derive(Clone, Default)]
struct CaptureClaims(Arc<Mutex<HashSet<Uuid>>>);

impl CaptureClaims {
    fn claim(&self, payment_id: Uuid) -> Option<CaptureClaim> {
        let mut held = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        held.insert(payment_id).then(|| CaptureClaim {
            claims: self.clone(),
            payment_id,
        })
    }
}

/// Released on drop, including when the capture future is cancelled
struct CaptureClaim {
    claims: CaptureClaims,
    payment_id: Uuid,
}

impl Drop for CaptureClaim {
    fn drop(&mut self) {
        self.claims
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.payment_id);
    }
}

fn require_transaction_id(transaction_id: &str) -> ShopResult<()> {
    if transaction_id.trim().is_empty() {
        return Err(ShopError::Validation("Transaction ID is required".to_string()));
    }
    Ok(())
}

fn ensure_payable(active: Option<&Payment>, order: &Order) -> ShopResult<()> {
    if order.status != OrderStatus::Pending {
        return Err(ShopError::OrderNotPayable {
            order_id: order.id,
            status: order.status,
        });
    }
    if active.is_some() {
        return Err(ShopError::PaymentAlreadyActive { order_id: order.id });
    }
    Ok(())
}

/// Apply a mapped remote status to a stored payment.
///
/// `completed` is sticky. A `failed` payment can only move to `completed`
/// (the gateway took the money after all), and only if no other attempt is
/// active for the order. Completing a payment marks its order paid in the
/// same transaction.
fn apply_remote(
    tx: &mut Transaction<'_>,
    payment_id: Uuid,
    mapped: PaymentStatus,
) -> ShopResult<(Payment, Order)> {
    let payment = tx
        .payment(payment_id)
        .cloned()
        .ok_or_else(|| ShopError::PaymentNotFound {
            reference: payment_id.to_string(),
        })?;
    let order = tx
        .order(payment.order_id)
        .cloned()
        .ok_or_else(|| ShopError::invariant(format!("payment {payment_id} has no order")))?;

    match (payment.status, mapped) {
        (current, next) if current == next => Ok((payment, order)),
        (PaymentStatus::Completed, next) => {
            warn!(%payment_id, remote = %next, "gateway disagrees with completed payment; keeping completed");
            Ok((payment, order))
        }
        (PaymentStatus::Failed, PaymentStatus::Pending) => Ok((payment, order)),
        (_, PaymentStatus::Completed) => complete(tx, payment, order),
        (PaymentStatus::Pending, next) => {
            let payment = tx.set_payment_status(payment_id, next)?;
            Ok((payment, order))
        }
        (PaymentStatus::Failed, PaymentStatus::Failed) => Ok((payment, order)),
    }
}

fn complete(tx: &mut Transaction<'_>, payment: Payment, order: Order) -> ShopResult<(Payment, Order)> {
    if let Some(active) = tx.active_payment_for_order(order.id) {
        if active.id != payment.id {
            return Err(ShopError::invariant(format!(
                "payment {} completed remotely while payment {} is active for order {}",
                payment.id, active.id, order.id
            )));
        }
    }

    let order = match order.status {
        OrderStatus::Pending => tx.set_order_status(order.id, OrderStatus::Paid)?,
        OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered => order,
        OrderStatus::Cancelled => {
            return Err(ShopError::invariant(format!(
                "payment {} completed for cancelled order {}",
                payment.id, order.id
            )))
        }
    };
    let payment = tx.set_payment_status(payment.id, PaymentStatus::Completed)?;
    Ok((payment, order))
}

fn outcome(payment: &Payment, order: &Order, remote: Option<RemoteStatus>) -> PaymentOutcome {
    PaymentOutcome {
        payment_id: payment.id,
        transaction_id: payment.transaction_id.clone(),
        status: payment.status,
        remote_status: remote,
        order_id: order.id,
        order_status: order.status,
    }
}
