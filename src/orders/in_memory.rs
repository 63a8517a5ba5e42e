//! In-memory order store backed by a concurrent map.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{Order, OrderPaymentState, OrderStore, PaymentOutcome, Result, StoreError};
use crate::types::OrderId;

/// In-memory `OrderStore` implementation.
///
/// State is lost on restart; a confirmed payment that cannot be re-verified
/// against the processor is recoverable through the status-check endpoint.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<OrderId, Order>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn register_pending(&self, order_id: OrderId, merchant_transaction_id: &str) -> Result<()> {
        let mut entry = self.orders.entry(order_id).or_insert_with(|| Order {
            id: order_id,
            payment_state: OrderPaymentState::AwaitingPayment,
            merchant_transaction_id: None,
            transaction_id: None,
            paid_at: None,
        });
        entry.payment_state = OrderPaymentState::AwaitingPayment;
        entry.merchant_transaction_id = Some(merchant_transaction_id.to_string());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.get(&order_id).map(|entry| entry.clone()))
    }

    async fn record_outcome(&self, order_id: OrderId, outcome: PaymentOutcome) -> Result<()> {
        let mut entry = self.orders.get_mut(&order_id).ok_or(StoreError::NotFound(order_id))?;

        match outcome {
            PaymentOutcome::Completed { transaction_id } => {
                if entry.payment_state == OrderPaymentState::Completed {
                    tracing::trace!(%order_id, "order already completed, skipping (idempotent)");
                    return Ok(());
                }
                entry.payment_state = OrderPaymentState::Completed;
                entry.transaction_id = Some(transaction_id);
                entry.paid_at = Some(Utc::now());
            }
            PaymentOutcome::Failed => {
                // A confirmed success is never downgraded by a late failure callback
                if entry.payment_state == OrderPaymentState::Completed {
                    tracing::warn!(%order_id, "ignoring failure outcome for already-completed order");
                    return Ok(());
                }
                entry.payment_state = OrderPaymentState::Failed;
            }
        }

        Ok(())
    }
}
