//! PhonePe pay-page gateway implementation.
//!
//! Payments are created against the standard checkout ("pay page") API:
//! the payload is base64-encoded JSON, signed with the merchant salt key,
//! and sent with an `X-VERIFY` header. Status checks sign the status path
//! instead of a body. See [`signing`](super::signing) for the scheme.

use async_trait::async_trait;
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::{
    config::PhonePeConfig,
    gateway::{
        PaymentError, PaymentGateway, PaymentInitiation, PaymentRequest, PaymentStatus, Result,
        StatusCheck, signing,
    },
    types::abbrev_id,
};

const PAY_PATH: &str = "/pg/v1/pay";
const STATUS_PATH: &str = "/pg/v1/status";

/// PhonePe pay-page gateway
pub struct PhonePeGateway {
    merchant_id: String,
    salt_key: String,
    salt_index: u8,
    base_url: Url,
    public_url: Url,
    client: reqwest::Client,
}

/// Payment creation payload.
///
/// Field declaration order is load-bearing: the serialized JSON bytes are
/// base64-encoded and signed, and the processor verifies the signature over
/// exactly those bytes. Do not reorder fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayPayload {
    merchant_id: String,
    merchant_transaction_id: String,
    merchant_user_id: String,
    /// Amount in minor currency units (paise)
    amount: i64,
    redirect_url: String,
    redirect_mode: String,
    callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_number: Option<String>,
    payment_instrument: serde_json::Value,
}

/// Envelope shared by the pay and status responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessorResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    #[serde(default)]
    instrument_response: Option<InstrumentResponse>,
    #[serde(default)]
    transaction_id: Option<String>,
    /// Amount in minor currency units
    #[serde(default)]
    amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    #[serde(default)]
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedirectInfo {
    #[serde(default)]
    url: Option<String>,
}

impl PhonePeGateway {
    /// Create a new PhonePe gateway from merchant configuration.
    pub fn new(config: &PhonePeConfig, public_url: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            merchant_id: config.merchant_id.clone(),
            salt_key: config.salt_key.clone(),
            salt_index: config.salt_index,
            base_url: config.base_url.clone(),
            public_url,
            client,
        })
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.merchant_id.trim().is_empty() || self.salt_key.trim().is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        // Url::join would discard the sandbox base path, so concatenate
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Generate a merchant transaction id: `MT` + millisecond timestamp +
    /// 7 random alphanumeric characters, uppercased.
    fn generate_transaction_id() -> String {
        let suffix: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(7)
            .map(char::from)
            .collect();
        format!("MT{}{}", Utc::now().timestamp_millis(), suffix.to_uppercase())
    }

    fn map_status(code: Option<&str>) -> PaymentStatus {
        match code {
            Some("PAYMENT_SUCCESS") => PaymentStatus::Success,
            Some("PAYMENT_ERROR") => PaymentStatus::Failed,
            // PAYMENT_PENDING, INTERNAL_SERVER_ERROR, TIMED_OUT and anything
            // unrecognized all mean "not final yet"
            _ => PaymentStatus::Pending,
        }
    }

    fn validate(request: &PaymentRequest) -> Result<()> {
        if request.order_id.is_nil() {
            return Err(PaymentError::Validation("order id is required".to_string()));
        }
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::Validation("amount must be positive".to_string()));
        }
        if request.customer_name.trim().is_empty() {
            return Err(PaymentError::Validation("customer name is required".to_string()));
        }
        Ok(())
    }

    /// Convert a major-unit amount to minor units (paise), truncating
    /// sub-paise precision.
    fn minor_units(amount: Decimal) -> Result<i64> {
        (amount * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .ok_or_else(|| PaymentError::Validation("amount out of range".to_string()))
    }

    fn build_payload(&self, request: &PaymentRequest, merchant_transaction_id: &str) -> Result<PayPayload> {
        let public_base = self.public_url.as_str().trim_end_matches('/');
        let redirect_url = format!(
            "{public_base}/payments/callback?orderId={}&merchantTransactionId={merchant_transaction_id}",
            request.order_id
        );

        Ok(PayPayload {
            merchant_id: self.merchant_id.clone(),
            merchant_transaction_id: merchant_transaction_id.to_string(),
            merchant_user_id: format!("USER{}", abbrev_id(&request.order_id)),
            amount: Self::minor_units(request.amount)?,
            redirect_url,
            redirect_mode: "REDIRECT".to_string(),
            callback_url: request.callback_url.to_string(),
            mobile_number: request.mobile_number.clone(),
            payment_instrument: json!({ "type": "PAY_PAGE" }),
        })
    }
}

#[async_trait]
impl PaymentGateway for PhonePeGateway {
    #[tracing::instrument(skip_all, fields(order_id = %request.order_id))]
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation> {
        self.ensure_configured()?;
        Self::validate(request)?;

        let merchant_transaction_id = Self::generate_transaction_id();
        let payload = self.build_payload(request, &merchant_transaction_id)?;

        let base64_payload = signing::encode_payload(&payload)?;
        let x_verify = signing::sign_payload(&base64_payload, PAY_PATH, &self.salt_key, self.salt_index);

        tracing::debug!(%merchant_transaction_id, "creating payment with processor");

        let response = self
            .client
            .post(self.endpoint(PAY_PATH))
            .header("X-VERIFY", x_verify)
            .json(&json!({ "request": base64_payload }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway { status, detail });
        }

        let body: ProcessorResponse = response.json().await?;
        if !body.success {
            let reason = body
                .message
                .or(body.code)
                .unwrap_or_else(|| "payment creation declined".to_string());
            return Err(PaymentError::Rejected(reason));
        }

        let payment_url = body
            .data
            .and_then(|data| data.instrument_response)
            .and_then(|instrument| instrument.redirect_info)
            .and_then(|redirect| redirect.url)
            .ok_or_else(|| PaymentError::Gateway {
                status,
                detail: "no payment URL in processor response".to_string(),
            })?;

        tracing::info!(%merchant_transaction_id, "payment created");

        Ok(PaymentInitiation {
            merchant_transaction_id,
            payment_url,
        })
    }

    #[tracing::instrument(skip_all, fields(merchant_transaction_id))]
    async fn check_status(&self, merchant_transaction_id: &str) -> Result<StatusCheck> {
        self.ensure_configured()?;

        let status_path = format!("{STATUS_PATH}/{}/{merchant_transaction_id}", self.merchant_id);
        let x_verify = signing::sign_status_path(&status_path, &self.salt_key, self.salt_index);

        let response = self
            .client
            .get(self.endpoint(&status_path))
            .header("X-VERIFY", x_verify)
            .header("X-MERCHANT-ID", &self.merchant_id)
            .send()
            .await?;

        let http_status = response.status();
        if !http_status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway {
                status: http_status,
                detail,
            });
        }

        let body: ProcessorResponse = response.json().await?;
        let status = Self::map_status(body.code.as_deref());
        let (transaction_id, amount) = match body.data {
            Some(data) => (
                data.transaction_id,
                data.amount.map(|minor| Decimal::from(minor) / Decimal::ONE_HUNDRED),
            ),
            None => (None, None),
        };

        tracing::debug!(code = ?body.code, ?status, "status check complete");

        Ok(StatusCheck {
            status,
            processor_code: body.code,
            processor_message: body.message,
            transaction_id,
            amount,
        })
    }
}
