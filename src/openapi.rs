//! OpenAPI documentation configuration.
//!
//! The generated schema is served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::api;
use crate::api::models::payments::{
    CallbackResponse, CreatePaymentRequest, CreatePaymentResponse, PaymentStatusResponse,
};
use crate::gateway::PaymentStatus;
use crate::orders::OrderPaymentState;

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Payment API server")
    ),
    paths(
        api::handlers::payments::create_payment,
        api::handlers::payments::verify_payment,
        api::handlers::payments::payment_callback,
    ),
    components(
        schemas(
            CreatePaymentRequest,
            CreatePaymentResponse,
            PaymentStatusResponse,
            CallbackResponse,
            PaymentStatus,
            OrderPaymentState,
        )
    ),
    tags(
        (name = "payments", description = "Payment creation, verification, and callback handling")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_schema_generates() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/payments/callback"));
        assert!(json.contains("CreatePaymentRequest"));
    }
}
