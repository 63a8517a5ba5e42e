//! HTTP handlers for payment creation, verification, and the redirect callback.
//!
//! The callback handler is the trust boundary of the whole flow: redirect
//! query parameters come through the user's browser and are only used to
//! identify the payment attempt. The authoritative status is always fetched
//! server-to-server before any order state changes.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::payments::{
        CallbackParams, CallbackResponse, CreatePaymentRequest, CreatePaymentResponse,
        PaymentStatusResponse,
    },
    errors::Error,
    gateway::{PaymentError, PaymentGateway, PaymentRequest, PaymentStatus, StatusCheck},
    orders::{Order, OrderPaymentState, PaymentOutcome},
    types::OrderId,
};
use std::sync::Arc;
use url::Url;

fn gateway_or_not_configured(state: &AppState) -> Result<Arc<dyn PaymentGateway>, Error> {
    state
        .gateway
        .clone()
        .ok_or(Error::Payment(PaymentError::NotConfigured))
}

/// Apply a verified status check to the order store.
///
/// Pending results never mutate anything. A store failure after the processor
/// confirmed the payment is logged loudly: money moved but the order record
/// did not, so the discrepancy needs manual reconciliation.
async fn apply_status(state: &AppState, order_id: OrderId, check: &StatusCheck) -> Result<(), Error> {
    match check.status {
        PaymentStatus::Success => {
            let transaction_id = check
                .transaction_id
                .clone()
                .unwrap_or_else(|| check.processor_code.clone().unwrap_or_default());
            state
                .orders
                .record_outcome(order_id, PaymentOutcome::Completed { transaction_id })
                .await
                .map_err(|e| {
                    tracing::error!(
                        %order_id,
                        error = %e,
                        "payment confirmed by processor but order update failed; manual reconciliation required"
                    );
                    Error::Internal {
                        operation: "record confirmed payment".to_string(),
                    }
                })?;
        }
        PaymentStatus::Failed => {
            state
                .orders
                .record_outcome(order_id, PaymentOutcome::Failed)
                .await
                .map_err(PaymentError::Store)?;
        }
        PaymentStatus::Pending => {
            tracing::debug!(%order_id, "payment still pending, leaving order untouched");
        }
    }
    Ok(())
}

/// Create a payment for an order
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    summary = "Create a payment",
    description = "Creates a payment with the configured gateway and returns the checkout URL to redirect the user to",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Payment created", body = CreatePaymentResponse),
        (status = 400, description = "Invalid request or order already paid"),
        (status = 402, description = "Payment rejected by processor"),
        (status = 501, description = "No payment gateway configured"),
        (status = 502, description = "Payment processor error"),
    )
)]
#[tracing::instrument(skip_all, fields(order_id = %request.order_id))]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>, Error> {
    let gateway = gateway_or_not_configured(&state)?;

    if let Some(order) = state.orders.get(request.order_id).await.map_err(PaymentError::Store)? {
        if order.payment_state == OrderPaymentState::Completed {
            return Err(Error::BadRequest {
                message: "order is already paid".to_string(),
            });
        }
    }

    let public_base = state.config.public_url.as_str().trim_end_matches('/');
    let callback_url = Url::parse(&format!("{public_base}/payments/callback"))
        .map_err(|e| Error::Internal {
            operation: format!("build callback URL: {e}"),
        })?;

    let payment_request = PaymentRequest {
        order_id: request.order_id,
        order_number: request.order_number,
        amount: request.amount,
        customer_name: request.customer_name,
        customer_email: request.customer_email,
        callback_url,
        mobile_number: request.mobile_number,
    };

    let initiation = gateway.initiate_payment(&payment_request).await?;

    // Register the attempt so the callback and status endpoints can find it
    state
        .orders
        .register_pending(request.order_id, &initiation.merchant_transaction_id)
        .await
        .map_err(PaymentError::Store)?;

    tracing::info!(
        merchant_transaction_id = %initiation.merchant_transaction_id,
        "payment created, awaiting completion"
    );

    Ok(Json(CreatePaymentResponse {
        order_id: request.order_id,
        merchant_transaction_id: initiation.merchant_transaction_id,
        payment_url: initiation.payment_url,
    }))
}

/// Verify the payment status of an order
#[utoipa::path(
    get,
    path = "/payments/{order_id}/status",
    tag = "payments",
    summary = "Verify payment status",
    description = "Checks the authoritative payment status with the processor and reconciles the order record",
    params(
        ("order_id" = String, Path, format = "uuid", description = "Order identifier"),
    ),
    responses(
        (status = 200, description = "Current payment status", body = PaymentStatusResponse),
        (status = 404, description = "No payment attempt known for this order"),
        (status = 501, description = "No payment gateway configured"),
        (status = 502, description = "Payment processor error"),
    )
)]
#[tracing::instrument(skip_all, fields(%order_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<PaymentStatusResponse>, Error> {
    let order = state
        .orders
        .get(order_id)
        .await
        .map_err(PaymentError::Store)?
        .ok_or_else(|| Error::NotFound {
            resource: "payment".to_string(),
            id: order_id.to_string(),
        })?;

    // Only re-check with the processor while the outcome is still open
    let payment_status = match (&order.merchant_transaction_id, order.payment_state) {
        (Some(merchant_transaction_id), OrderPaymentState::AwaitingPayment) => {
            let gateway = gateway_or_not_configured(&state)?;
            let check = gateway.check_status(merchant_transaction_id).await?;
            apply_status(&state, order_id, &check).await?;
            Some(check.status)
        }
        _ => None,
    };

    let order = state
        .orders
        .get(order_id)
        .await
        .map_err(PaymentError::Store)?
        .unwrap_or(order);

    Ok(Json(status_response(order, payment_status)))
}

fn status_response(order: Order, payment_status: Option<PaymentStatus>) -> PaymentStatusResponse {
    PaymentStatusResponse {
        order_id: order.id,
        order_state: order.payment_state,
        payment_status,
        transaction_id: order.transaction_id,
        paid_at: order.paid_at,
    }
}

/// Handle the processor redirect callback
#[utoipa::path(
    get,
    path = "/payments/callback",
    tag = "payments",
    summary = "Payment redirect callback",
    description = "Landing endpoint for the processor redirect. Query parameters only identify the payment; the status is verified server-to-server before the order is updated",
    params(CallbackParams),
    responses(
        (status = 200, description = "Verified payment outcome", body = CallbackResponse),
        (status = 400, description = "Malformed callback"),
        (status = 501, description = "No payment gateway configured"),
        (status = 502, description = "Payment processor error"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, Error> {
    let order_id = params.order_id.ok_or_else(|| {
        Error::Payment(PaymentError::InvalidCallback("missing orderId parameter".to_string()))
    })?;

    tracing::debug!(%order_id, code = ?params.code, "processing payment callback");

    // The transaction id may come from the redirect or from our own record;
    // either way it is only a lookup key
    let merchant_transaction_id = match params.merchant_transaction_id() {
        Some(id) => id.to_string(),
        None => state
            .orders
            .get(order_id)
            .await
            .map_err(PaymentError::Store)?
            .and_then(|order| order.merchant_transaction_id)
            .ok_or_else(|| {
                Error::Payment(PaymentError::InvalidCallback(
                    "no merchant transaction id for this order".to_string(),
                ))
            })?,
    };

    let gateway = gateway_or_not_configured(&state)?;
    let check = gateway.check_status(&merchant_transaction_id).await?;
    apply_status(&state, order_id, &check).await?;

    let order_state = state
        .orders
        .get(order_id)
        .await
        .map_err(PaymentError::Store)?
        .map(|order| order.payment_state)
        .unwrap_or(OrderPaymentState::AwaitingPayment);

    Ok(Json(CallbackResponse {
        order_id,
        payment_status: check.status,
        order_state,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GatewayConfig, PhonePeConfig};
    use crate::gateway::create_gateway;
    use crate::orders::in_memory::InMemoryOrderStore;
    use axum_test::TestServer;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_state(processor: &MockServer) -> AppState {
        let mut config = Config::default();
        config.public_url = Url::parse("https://shop.example.com").unwrap();
        config.gateway = Some(GatewayConfig::Phonepe(PhonePeConfig {
            merchant_id: "MERCHANT123".to_string(),
            salt_key: "s3cret".to_string(),
            salt_index: 1,
            base_url: Url::parse(&processor.uri()).unwrap(),
            timeout: Duration::from_secs(5),
        }));

        let gateway = create_gateway(config.gateway.as_ref().unwrap(), &config.public_url).unwrap();
        AppState {
            config,
            gateway: Some(gateway),
            orders: Arc::new(InMemoryOrderStore::new()),
        }
    }

    fn test_server(state: AppState) -> TestServer {
        TestServer::new(crate::build_router(state).unwrap()).unwrap()
    }

    async fn mock_pay_success(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/pg/v1/pay"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "code": "PAYMENT_INITIATED",
                "data": {
                    "instrumentResponse": {
                        "redirectInfo": { "url": "https://pay.example.com/checkout/abc" }
                    }
                }
            })))
            .mount(server)
            .await;
    }

    async fn mock_status_code(server: &MockServer, code: &str, transaction_id: Option<&str>) {
        let mut data = json!({});
        if let Some(txn) = transaction_id {
            data = json!({ "transactionId": txn, "amount": 49950 });
        }
        Mock::given(method("GET"))
            .and(path_regex(r"^/pg/v1/status/MERCHANT123/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "code": code,
                "data": data
            })))
            .mount(server)
            .await;
    }

    fn create_body(order_id: Uuid) -> serde_json::Value {
        json!({
            "order_id": order_id,
            "order_number": "ORD-42",
            "amount": "499.50",
            "customer_name": "Asha",
            "customer_email": "asha@example.com"
        })
    }

    #[tokio::test]
    async fn test_create_payment_returns_checkout_url() {
        let processor = MockServer::start().await;
        mock_pay_success(&processor).await;
        let state = test_state(&processor).await;
        let server = test_server(state.clone());
        let order_id = Uuid::new_v4();

        let response = server.post("/api/v1/payments").json(&create_body(order_id)).await;
        response.assert_status_ok();

        let body: CreatePaymentResponse = response.json();
        assert_eq!(body.order_id, order_id);
        assert_eq!(body.payment_url, "https://pay.example.com/checkout/abc");

        // The attempt is registered so the callback can find it later
        let order = state.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_state, OrderPaymentState::AwaitingPayment);
        assert_eq!(
            order.merchant_transaction_id.as_deref(),
            Some(body.merchant_transaction_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_create_payment_without_gateway_is_501() {
        let mut state = {
            let processor = MockServer::start().await;
            test_state(&processor).await
        };
        state.gateway = None;
        let server = test_server(state);

        let response = server.post("/api/v1/payments").json(&create_body(Uuid::new_v4())).await;
        response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_create_payment_rejects_paid_order() {
        let processor = MockServer::start().await;
        mock_pay_success(&processor).await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT0").await.unwrap();
        state
            .orders
            .record_outcome(
                order_id,
                PaymentOutcome::Completed {
                    transaction_id: "T1".into(),
                },
            )
            .await
            .unwrap();

        let server = test_server(state);
        let response = server.post("/api/v1/payments").json(&create_body(order_id)).await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_callback_verifies_before_completing() {
        let processor = MockServer::start().await;
        mock_status_code(&processor, "PAYMENT_SUCCESS", Some("T2409261543")).await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT100").await.unwrap();

        let server = test_server(state.clone());
        let response = server
            .get("/payments/callback")
            .add_query_param("orderId", order_id.to_string())
            .add_query_param("merchantTransactionId", "MT100")
            .await;
        response.assert_status_ok();

        let body: CallbackResponse = response.json();
        assert_eq!(body.payment_status, PaymentStatus::Success);
        assert_eq!(body.order_state, OrderPaymentState::Completed);

        let order = state.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.transaction_id.as_deref(), Some("T2409261543"));
        assert!(order.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_callback_ignores_forged_success_params() {
        let processor = MockServer::start().await;
        // The processor says pending, whatever the redirect claims
        mock_status_code(&processor, "PAYMENT_PENDING", None).await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT100").await.unwrap();

        let server = test_server(state.clone());
        let response = server
            .get("/payments/callback")
            .add_query_param("orderId", order_id.to_string())
            .add_query_param("merchantTransactionId", "MT100")
            .add_query_param("code", "PAYMENT_SUCCESS")
            .add_query_param("transactionId", "T-FORGED")
            .await;
        response.assert_status_ok();

        let body: CallbackResponse = response.json();
        assert_eq!(body.payment_status, PaymentStatus::Pending);

        // No order mutation happened
        let order = state.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_state, OrderPaymentState::AwaitingPayment);
        assert!(order.transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_callback_records_failure() {
        let processor = MockServer::start().await;
        mock_status_code(&processor, "PAYMENT_ERROR", None).await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT100").await.unwrap();

        let server = test_server(state.clone());
        let response = server
            .get("/payments/callback")
            .add_query_param("orderId", order_id.to_string())
            .await;
        response.assert_status_ok();

        let order = state.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_state, OrderPaymentState::Failed);
    }

    #[tokio::test]
    async fn test_callback_accepts_payment_id_alias() {
        let processor = MockServer::start().await;
        mock_status_code(&processor, "PAYMENT_SUCCESS", Some("T7")).await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT100").await.unwrap();

        let server = test_server(state.clone());
        let response = server
            .get("/payments/callback")
            .add_query_param("orderId", order_id.to_string())
            .add_query_param("paymentId", "MT100")
            .await;
        response.assert_status_ok();

        let order = state.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_state, OrderPaymentState::Completed);
    }

    #[tokio::test]
    async fn test_callback_missing_order_id_is_400() {
        let processor = MockServer::start().await;
        let state = test_state(&processor).await;
        let server = test_server(state);

        let response = server
            .get("/payments/callback")
            .add_query_param("merchantTransactionId", "MT100")
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_callback_unknown_order_without_txn_is_400() {
        let processor = MockServer::start().await;
        let state = test_state(&processor).await;
        let server = test_server(state);

        let response = server
            .get("/payments/callback")
            .add_query_param("orderId", Uuid::new_v4().to_string())
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_verify_payment_reconciles_pending_order() {
        let processor = MockServer::start().await;
        mock_status_code(&processor, "PAYMENT_SUCCESS", Some("T99")).await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT100").await.unwrap();

        let server = test_server(state.clone());
        let response = server.get(&format!("/api/v1/payments/{order_id}/status")).await;
        response.assert_status_ok();

        let body: PaymentStatusResponse = response.json();
        assert_eq!(body.order_state, OrderPaymentState::Completed);
        assert_eq!(body.payment_status, Some(PaymentStatus::Success));
        assert_eq!(body.transaction_id.as_deref(), Some("T99"));
    }

    #[tokio::test]
    async fn test_verify_payment_settled_order_skips_processor() {
        // No status mock mounted: a processor call would fail the request
        let processor = MockServer::start().await;
        let state = test_state(&processor).await;
        let order_id = Uuid::new_v4();
        state.orders.register_pending(order_id, "MT100").await.unwrap();
        state
            .orders
            .record_outcome(
                order_id,
                PaymentOutcome::Completed {
                    transaction_id: "T1".into(),
                },
            )
            .await
            .unwrap();

        let server = test_server(state);
        let response = server.get(&format!("/api/v1/payments/{order_id}/status")).await;
        response.assert_status_ok();

        let body: PaymentStatusResponse = response.json();
        assert_eq!(body.order_state, OrderPaymentState::Completed);
        assert_eq!(body.payment_status, None);
    }

    #[tokio::test]
    async fn test_verify_payment_unknown_order_is_404() {
        let processor = MockServer::start().await;
        let state = test_state(&processor).await;
        let server = test_server(state);

        let response = server.get(&format!("/api/v1/payments/{}/status", Uuid::new_v4())).await;
        response.assert_status_not_found();
    }
}
