use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::gateway::PaymentError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Payment gateway operation error
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Payment(payment_err) => StatusCode::from(payment_err),
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Payment(payment_err) => match payment_err {
                PaymentError::NotConfigured => {
                    "Payment gateway not configured. Please contact support.".to_string()
                }
                PaymentError::Validation(message) => message.clone(),
                PaymentError::InvalidCallback(message) => {
                    format!("Invalid payment callback: {message}")
                }
                PaymentError::Rejected(message) => format!("Payment failed: {message}"),
                PaymentError::Gateway { .. } | PaymentError::Http(_) => {
                    "Payment processor error. Please try again.".to_string()
                }
                PaymentError::Serialization(_) | PaymentError::Store(_) => {
                    "Internal server error".to_string()
                }
            },
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Payment(payment_err) => match payment_err {
                PaymentError::Gateway { .. }
                | PaymentError::Http(_)
                | PaymentError::Serialization(_)
                | PaymentError::Store(_) => {
                    tracing::error!("Payment gateway error: {:#}", self);
                }
                PaymentError::Rejected(_) => {
                    tracing::warn!("Payment rejected: {}", self);
                }
                PaymentError::NotConfigured
                | PaymentError::Validation(_)
                | PaymentError::InvalidCallback(_) => {
                    tracing::debug!("Payment client error: {}", self);
                }
            },
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = serde_json::json!({ "error": self.user_message() });
        (status, axum::response::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_error_status_codes() {
        assert_eq!(
            Error::Payment(PaymentError::NotConfigured).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            Error::Payment(PaymentError::Rejected("declined".into())).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            Error::Payment(PaymentError::InvalidCallback("missing id".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::BadRequest {
                message: "bad".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_messages_do_not_leak_details() {
        let err = Error::Internal {
            operation: "talk to the database at 10.0.0.5".into(),
        };
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::Payment(PaymentError::Gateway {
            status: StatusCode::BAD_GATEWAY,
            detail: "upstream said KEY_NOT_CONFIGURED for salt".into(),
        });
        assert!(!err.user_message().contains("salt"));
    }
}
