//! UPI payment gateway control service.
//!
//! Creates signed payments with a UPI processor, verifies their status
//! server-to-server, and handles the processor's redirect callback. The
//! processor-specific pieces live behind the [`gateway::PaymentGateway`]
//! trait; everything above it (handlers, order bookkeeping, configuration)
//! is processor-agnostic.
//!
//! # Architecture
//!
//! - **[`gateway`]**: Payment gateway trait plus the PhonePe and dummy
//!   implementations, including X-VERIFY request signing
//! - **[`orders`]**: Order payment-state bookkeeping
//! - **[`api`]**: Axum handlers and request/response models
//! - **[`config`]**: YAML + environment configuration via figment
//!
//! # Payment flow
//!
//! 1. `POST /api/v1/payments` creates a payment with the processor and
//!    returns a hosted checkout URL
//! 2. The user completes payment and the processor redirects the browser to
//!    `GET /payments/callback`
//! 3. The callback (or `GET /api/v1/payments/{id}/status`) verifies the
//!    status with the processor before any order state changes

pub mod api;
pub mod config;
pub mod errors;
pub mod gateway;
mod openapi;
pub mod orders;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use errors::Error;

use std::sync::Arc;

use axum::{Json, Router, http::HeaderValue, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;

use crate::config::CorsOrigin;
use crate::gateway::{PaymentGateway, create_gateway};
use crate::openapi::ApiDoc;
use crate::orders::{OrderStore, in_memory::InMemoryOrderStore};

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Configured payment gateway; `None` means payment endpoints return 501
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub orders: Arc<dyn OrderStore>,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    let mut has_wildcard = false;
    for origin in &config.cors.allowed_origins {
        match origin {
            CorsOrigin::Wildcard => has_wildcard = true,
            CorsOrigin::Url(url) => {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
    }

    // `AllowOrigin::list` panics on a literal `*`; wildcard must use `any()`
    let allow_origin = if has_wildcard {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(config.cors.allow_credentials)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let api_routes = Router::new()
        .route("/payments", post(api::handlers::payments::create_payment))
        .route(
            "/payments/{order_id}/status",
            get(api::handlers::payments::verify_payment),
        );

    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/payments/callback", get(api::handlers::payments::payment_callback))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The assembled application, ready to serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let gateway = match &config.gateway {
            Some(gateway_config) => Some(create_gateway(gateway_config, &config.public_url)?),
            None => {
                tracing::warn!("no payment gateway configured; payment endpoints will return 501");
                None
            }
        };

        let state = AppState {
            config: config.clone(),
            gateway,
            orders: Arc::new(InMemoryOrderStore::new()),
        };

        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application until the shutdown future resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Payment service listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    fn test_router() -> Router {
        let state = AppState {
            config: Config::default(),
            gateway: None,
            orders: Arc::new(InMemoryOrderStore::new()),
        };
        build_router(state).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = TestServer::new(test_router()).unwrap();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("ok");
    }

    #[tokio::test]
    async fn test_openapi_endpoint() {
        let server = TestServer::new(test_router()).unwrap();
        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"].is_object());
    }

    #[test]
    fn test_wildcard_cors_without_credentials() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.cors.allow_credentials = false;
        assert!(create_cors_layer(&config).is_ok());
    }
}
