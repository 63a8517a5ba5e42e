//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Payments** (`/api/v1/payments/*`): Payment creation and status verification
//! - **Callback** (`/payments/callback`): Processor redirect landing endpoint
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! the schema is served at `/api-docs/openapi.json`.

pub mod handlers;
pub mod models;
