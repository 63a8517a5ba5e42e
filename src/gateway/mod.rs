//! Payment gateway abstraction layer.
//!
//! This module defines the `PaymentGateway` trait which abstracts payment
//! processing across different UPI gateways, plus the error taxonomy shared
//! by all implementations.

use async_trait::async_trait;
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;
use utoipa::ToSchema;

use crate::{
    config::GatewayConfig,
    types::OrderId,
};

pub mod dummy;
pub mod phonepe;
pub mod signing;

/// Create a payment gateway from configuration.
///
/// This is the single point where config is converted into gateway instances.
/// Adding a new processor requires adding a match arm here.
pub fn create_gateway(config: &GatewayConfig, public_url: &Url) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config {
        GatewayConfig::Phonepe(phonepe_config) => {
            Ok(Arc::new(phonepe::PhonePeGateway::new(phonepe_config, public_url.clone())?))
        }
        GatewayConfig::Dummy(_) => Ok(Arc::new(dummy::DummyGateway::new(public_url.clone()))),
    }
}

/// Result type for payment gateway operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Processor credentials absent or empty. Fatal, not retryable.
    #[error("payment gateway not configured")]
    NotConfigured,

    /// Required caller-supplied fields missing or invalid. Caller must correct.
    #[error("invalid payment request: {0}")]
    Validation(String),

    /// Non-success HTTP response or malformed processor response.
    #[error("processor returned {status}: {detail}")]
    Gateway { status: StatusCode, detail: String },

    /// Processor explicitly declined the payment.
    #[error("payment rejected by processor: {0}")]
    Rejected(String),

    /// Malformed redirect callback. No order mutation is performed.
    #[error("invalid payment callback: {0}")]
    InvalidCallback(String),

    /// Payment payload could not be serialized for signing.
    #[error("failed to serialize payment payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level failure talking to the processor.
    #[error("processor request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Order store failure.
    #[error(transparent)]
    Store(#[from] crate::orders::StoreError),
}

impl From<&PaymentError> for StatusCode {
    fn from(err: &PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => StatusCode::NOT_IMPLEMENTED,
            PaymentError::Validation(_) | PaymentError::InvalidCallback(_) => StatusCode::BAD_REQUEST,
            PaymentError::Rejected(_) => StatusCode::PAYMENT_REQUIRED,
            PaymentError::Gateway { .. } | PaymentError::Http(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Serialization(_) | PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A payment attempt to be created with the processor.
///
/// Ephemeral and unpersisted: this structure has no lifecycle beyond a single
/// request/response exchange.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    /// Human-facing order number, for logs only
    pub order_number: Option<String>,
    /// Amount in major currency units; converted to minor units on the wire
    pub amount: Decimal,
    pub customer_name: String,
    pub customer_email: Option<String>,
    /// Server-to-server callback URL passed through to the processor
    pub callback_url: Url,
    pub mobile_number: Option<String>,
}

/// Result of a successful payment creation
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    /// Caller-generated identifier correlating this attempt across creation
    /// and verification calls
    pub merchant_transaction_id: String,
    /// Hosted checkout page the user should be redirected to
    pub payment_url: String,
}

/// Three-way payment status classification.
///
/// Every processor response code maps to exactly one of these; there are no
/// further sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
    Pending,
}

/// Result of a single status check against the processor
#[derive(Debug, Clone)]
pub struct StatusCheck {
    pub status: PaymentStatus,
    /// Raw processor response code (e.g. "PAYMENT_SUCCESS")
    pub processor_code: Option<String>,
    pub processor_message: Option<String>,
    /// Processor-side transaction reference, when available
    pub transaction_id: Option<String>,
    /// Amount in major currency units, when reported by the processor
    pub amount: Option<Decimal>,
}

/// Abstract payment gateway interface.
///
/// Implementors integrate a specific processor behind the same two
/// operations: create a payment and check its status. Each call is
/// independent; no retries, polling, or timeouts are applied here beyond the
/// HTTP client's own timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a new payment with the processor.
    ///
    /// Returns the merchant transaction id for this attempt and the checkout
    /// URL the user should be redirected to.
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation>;

    /// Check the authoritative status of a payment attempt.
    ///
    /// Performs exactly one server-to-server check per call. Retries and
    /// polling cadence are the caller's responsibility.
    async fn check_status(&self, merchant_transaction_id: &str) -> Result<StatusCheck>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(StatusCode::from(&PaymentError::NotConfigured), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            StatusCode::from(&PaymentError::Validation("missing amount".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StatusCode::from(&PaymentError::Rejected("declined".into())),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            StatusCode::from(&PaymentError::Gateway {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "KEY_NOT_CONFIGURED".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            StatusCode::from(&PaymentError::InvalidCallback("missing order id".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_payment_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Success).unwrap(), r#""success""#);
        assert_eq!(serde_json::to_string(&PaymentStatus::Failed).unwrap(), r#""failed""#);
        assert_eq!(serde_json::to_string(&PaymentStatus::Pending).unwrap(), r#""pending""#);
    }
}
