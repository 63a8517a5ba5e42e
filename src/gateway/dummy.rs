//! Dummy payment gateway for local development.
//!
//! Accepts every payment without talking to a processor: the "checkout page"
//! is the service's own callback URL with success parameters prefilled, so
//! the full redirect and verification flow can be exercised end to end.

use async_trait::async_trait;

use crate::gateway::{
    PaymentGateway, PaymentInitiation, PaymentRequest, PaymentStatus, Result, StatusCheck,
};
use url::Url;

/// Gateway that approves every payment instantly
pub struct DummyGateway {
    public_url: Url,
}

impl DummyGateway {
    pub fn new(public_url: Url) -> Self {
        Self { public_url }
    }
}

#[async_trait]
impl PaymentGateway for DummyGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation> {
        let merchant_transaction_id = format!("DUMMY-{}", request.order_id);
        let public_base = self.public_url.as_str().trim_end_matches('/');
        let payment_url = format!(
            "{public_base}/payments/callback?orderId={}&merchantTransactionId={merchant_transaction_id}",
            request.order_id
        );

        tracing::info!(order_id = %request.order_id, "dummy gateway approved payment");

        Ok(PaymentInitiation {
            merchant_transaction_id,
            payment_url,
        })
    }

    async fn check_status(&self, merchant_transaction_id: &str) -> Result<StatusCheck> {
        Ok(StatusCheck {
            status: PaymentStatus::Success,
            processor_code: Some("PAYMENT_SUCCESS".to_string()),
            processor_message: Some("Dummy payment approved".to_string()),
            transaction_id: Some(format!("DUMMYTXN-{merchant_transaction_id}")),
            amount: None,
        })
    }
}
