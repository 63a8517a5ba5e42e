//! API request/response models for payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::gateway::PaymentStatus;
use crate::orders::OrderPaymentState;
use crate::types::OrderId;

/// Request body for creating a payment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    #[schema(value_type = String, format = "uuid")]
    pub order_id: OrderId,
    /// Human-facing order number, used in logs
    pub order_number: Option<String>,
    /// Amount in major currency units (rupees)
    #[schema(value_type = String, example = "499.50")]
    pub amount: Decimal,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub mobile_number: Option<String>,
}

/// Response for a successfully created payment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub order_id: OrderId,
    /// Identifier correlating this payment attempt across status checks
    pub merchant_transaction_id: String,
    /// Hosted checkout page to redirect the user to
    pub payment_url: String,
}

/// Response for a payment status lookup
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusResponse {
    #[schema(value_type = String, format = "uuid")]
    pub order_id: OrderId,
    pub order_state: OrderPaymentState,
    /// Live status from the processor, when a check was performed
    pub payment_status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Query parameters delivered by the processor redirect.
///
/// Everything here is attacker-controllable: the user's browser carries these
/// values, so they identify which payment to verify and nothing more. The
/// status itself always comes from a server-to-server check.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    #[param(value_type = String, format = "uuid")]
    pub order_id: Option<OrderId>,
    pub merchant_transaction_id: Option<String>,
    /// Alternate name some processors use for the merchant transaction id
    pub payment_id: Option<String>,
    /// Processor-reported transaction reference; informational only
    pub transaction_id: Option<String>,
    /// Processor-reported gateway reference; informational only
    pub provider_reference_id: Option<String>,
    /// Processor-reported status code; never trusted
    pub code: Option<String>,
}

impl CallbackParams {
    /// The merchant transaction id under whichever name it arrived.
    pub fn merchant_transaction_id(&self) -> Option<&str> {
        self.merchant_transaction_id
            .as_deref()
            .or(self.payment_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

/// Response for the callback endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CallbackResponse {
    #[schema(value_type = String, format = "uuid")]
    pub order_id: OrderId,
    /// Verified payment status from the server-to-server check
    pub payment_status: PaymentStatus,
    pub order_state: OrderPaymentState,
}
