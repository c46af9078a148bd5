//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. The client logs
//! failures before returning them; callers decide how to present them (for
//! example, suppressing UI for [`InferenceError::Cancelled`]).

use thiserror::Error;

/// Errors that can occur while talking to the inference server.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the inference server failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// Non-2xx HTTP response from the inference server.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
    },

    /// The server answered 2xx but the body did not have the expected shape.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        endpoint: String,
        reason: String,
    },

    /// A single streamed line was not a JSON object. Recovered locally.
    #[error("chunk parse error: {reason}")]
    ChunkParseError {
        raw: String,
        reason: String,
    },

    /// The transport failed after the response headers arrived.
    #[error("stream error: {reason}")]
    StreamError {
        reason: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl InferenceError {
    /// Whether this is a request-level failure on either endpoint: connection
    /// refused, DNS failure, non-2xx status, or a malformed response body.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. }
                | InferenceError::HttpError { .. }
                | InferenceError::InvalidResponse { .. }
        )
    }

    /// Whether this error is the caller-initiated abort path.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, InferenceError::Cancelled)
    }

    /// Extract the error body text, if this is an `HttpError`.
    pub fn error_body(&self) -> Option<&str> {
        match self {
            InferenceError::HttpError { body, .. } => Some(body),
            _ => None,
        }
    }
}
