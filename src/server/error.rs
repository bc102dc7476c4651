use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Reasons a webhook delivery is rejected
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("missing event header")]
    MissingEvent,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Event kind the service does not handle
    #[error("unexpected event: {0}")]
    UnexpectedEvent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature | Self::InvalidSignatureFormat(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::MissingEvent | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::UnexpectedEvent(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        // Never echo secrets or payload details back to the caller
        let body = match &self {
            Self::MissingSignature => "Missing signature",
            Self::InvalidSignatureFormat(_) => "Invalid signature format",
            Self::InvalidSignature => "Invalid signature",
            Self::MissingEvent => "Missing event",
            Self::InvalidPayload(_) => "Invalid payload",
            Self::UnexpectedEvent(_) => "Unexpected event",
            Self::Internal(_) => "Internal server error",
        };

        (self.status_code(), body).into_response()
    }
}
