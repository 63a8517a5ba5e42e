//! Order payment-outcome storage.
//!
//! The callback path must record a verified payment outcome against an order
//! exactly once. This trait abstracts that mutation so the HTTP layer never
//! touches a concrete store directly; the in-memory implementation backs the
//! service and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OrderId;

pub mod in_memory;

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Order not found
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Internal store error
    #[error("order store error: {0}")]
    Internal(String),
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentState {
    AwaitingPayment,
    Completed,
    Failed,
}

/// An order's payment-side record.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub payment_state: OrderPaymentState,
    /// Our identifier for the latest payment attempt
    pub merchant_transaction_id: Option<String>,
    /// Processor-side transaction reference, set on completion
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A verified payment outcome to record against an order.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Completed { transaction_id: String },
    Failed,
}

/// Storage trait for order payment outcomes.
///
/// `record_outcome` must be idempotent: recording the same outcome twice is a
/// no-op, so duplicate callback deliveries cannot double-apply.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Register a payment attempt for an order, marking it awaiting payment.
    async fn register_pending(&self, order_id: OrderId, merchant_transaction_id: &str) -> Result<()>;

    /// Fetch an order's payment record, if it exists.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Record a verified payment outcome.
    ///
    /// # Errors
    /// - `NotFound` if no payment attempt was registered for the order
    async fn record_outcome(&self, order_id: OrderId, outcome: PaymentOutcome) -> Result<()>;
}
