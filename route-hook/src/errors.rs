use crate::config::ValidationError;
use crate::delivery::DeliveryFailure;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for route-hook operations
pub type Result<T, E = RouteHookError> = std::result::Result<T, E>;

/// Errors that prevent the route hook from starting or serving
#[derive(Error, Debug)]
pub enum RouteHookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

/// Failures of a single relay request.
///
/// Every variant is recovered into a JSON body for the caller. The display
/// string is the `error` field of that body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Only POST method allowed")]
    MethodNotAllowed,

    #[error("Invalid JSON data")]
    InvalidPayload,

    #[error("N8N webhook URL not configured")]
    WebhookNotConfigured,

    #[error("Failed to send city route to n8n")]
    Delivery(#[from] DeliveryFailure),
}

impl RelayError {
    /// Only malformed requests get a non-200 status. Business failures are
    /// carried in the body's `success` flag.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::InvalidPayload => StatusCode::BAD_REQUEST,
            RelayError::WebhookNotConfigured | RelayError::Delivery(_) => StatusCode::OK,
        }
    }

    /// Metric tag for the request outcome
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed => "method_not_allowed",
            RelayError::InvalidPayload => "invalid_payload",
            RelayError::WebhookNotConfigured => "not_configured",
            RelayError::Delivery(DeliveryFailure::Transport(_)) => "delivery_transport_error",
            RelayError::Delivery(DeliveryFailure::Status { .. }) => "delivery_http_error",
        }
    }
}
