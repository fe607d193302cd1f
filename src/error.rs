// Error handling module
// Defines adapter error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the Xero client and adapter
#[derive(Error, Debug)]
pub enum XeroError {
    /// Token pair is missing access_token or refresh_token
    #[error("Invalid token data: {0}")]
    InvalidToken(String),

    /// An operation was called before init_client completed
    #[error("Xero client is not initialized (call init_client first)")]
    ClientNotInitialized,

    /// No organisation is connected to the authorized user
    #[error("No tenants connected to this application")]
    NoTenants,

    /// Accounts response carried no accounts
    #[error("No accounts found.")]
    NoAccountsFound,

    /// Authorization callback could not be completed
    #[error("OAuth callback error: {0}")]
    Callback(String),

    /// Non-success response from a Xero endpoint
    #[error("Xero API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    /// Transport or decode failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed endpoint or callback URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Error from Xero API
    #[error("Xero API error: {status} - {message}")]
    XeroApiError { status: u16, message: String },

    /// Requested resource does not exist upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// Gateway is not connected to Xero yet
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Xero could not be reached
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<XeroError> for ApiError {
    fn from(err: XeroError) -> Self {
        match err {
            XeroError::InvalidToken(_) | XeroError::Callback(_) => {
                ApiError::ValidationError(err.to_string())
            }
            XeroError::ClientNotInitialized | XeroError::NoTenants => {
                ApiError::NotReady(err.to_string())
            }
            XeroError::NoAccountsFound => ApiError::NotFound(err.to_string()),
            XeroError::Api {
                status,
                message,
                body,
            } => ApiError::XeroApiError {
                status,
                message: if body.is_empty() { message } else { body },
            },
            XeroError::Http(_) => ApiError::Upstream(err.to_string()),
            XeroError::Url(_) => ApiError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "auth_error", msg),
            ApiError::XeroApiError { status, message } => {
                let status_code =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status_code, "xero_api_error", message)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::NotReady(msg) => (StatusCode::SERVICE_UNAVAILABLE, "not_ready", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, XeroError>;
