//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use markproof_core::WatermarkError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload too large - upload exceeds the configured size
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Watermark core error
    #[error("Watermark error: {0}")]
    Watermark(#[from] WatermarkError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Watermark(ref e) => match e {
                // Valid request the image cannot satisfy → 422
                WatermarkError::InsufficientCapacity { .. } => StatusCode::UNPROCESSABLE_ENTITY,

                // Remaining client-provided invalid input → 400
                e if e.is_client_error() => StatusCode::BAD_REQUEST,

                // Decoder missing → 503
                WatermarkError::NotReady(_) | WatermarkError::FatalLoad { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }

                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Watermark(ref e) => match e {
                WatermarkError::InvalidInput(_) => "INVALID_INPUT",
                WatermarkError::UnsupportedWavelet(_) => "UNSUPPORTED_WAVELET",
                WatermarkError::InvalidImage(_) => "INVALID_IMAGE",
                WatermarkError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
                WatermarkError::Processing(_) => "PROCESSING_ERROR",
                WatermarkError::NotReady(_) => "DECODER_NOT_READY",
                WatermarkError::FatalLoad { .. } => "DECODER_LOAD_FAILED",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Core client errors are safe to echo; server-side ones are not
            Self::Watermark(ref e) => match e {
                WatermarkError::Processing(_) => "Watermark processing failed".to_string(),
                WatermarkError::NotReady(_) | WatermarkError::FatalLoad { .. } => {
                    "Watermark decoder is not available".to_string()
                }
                other => other.to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Internal(_) => "internal",
            Self::Watermark(_) => "watermark",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
