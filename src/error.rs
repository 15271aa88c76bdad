//! # Error Handling
//!
//! Custom error types and their mapping onto HTTP responses.
//!
//! ## Error Categories:
//! - **Validation/NotFound**: rejected before any external call (400/404)
//! - **Decode/Transcription/Synthesis**: an external capability failed and the
//!   whole chunk fails with it (502)
//! - **Render**: precondition failures are validation errors; execution
//!   failures carry the external process's bounded diagnostic output (500);
//!   a second render for the same session is a conflict (409)
//! - **Internal/ConfigError**: server-side problems (500)
//!
//! Translation degradation is deliberately NOT represented here: the
//! orchestrator never fails terminally, it degrades to the original text and
//! reports the distinction through `TranslationOutcome`.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Application-level error type returned by every HTTP handler.
///
/// Each variant holds a human-readable message; the `ResponseError` impl maps
/// variants to status codes and a machine-readable `type` tag.
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (I/O failures, lock poisoning, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested session or resource does not exist
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// Request input failed validation rules
    ValidationError(String),

    /// The transcode step could not decode the submitted chunk
    Decode(String),

    /// The ASR capability failed; the chunk fails, the timeline is untouched
    Transcription(String),

    /// The speech-synthesis capability failed after transcription succeeded
    Synthesis(String),

    /// The render mux/mix subprocess exited non-zero (bounded diagnostics)
    Render(String),

    /// A render is already in flight for this session
    RenderInProgress(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Decode(msg) => write!(f, "Decode error: {}", msg),
            AppError::Transcription(msg) => write!(f, "Transcription error: {}", msg),
            AppError::Synthesis(msg) => write!(f, "Synthesis error: {}", msg),
            AppError::Render(msg) => write!(f, "Render error: {}", msg),
            AppError::RenderInProgress(msg) => write!(f, "Render in progress: {}", msg),
        }
    }
}

/// Converts errors into the JSON envelope every endpoint shares:
///
/// ```json
/// {
///   "error": {
///     "type": "transcription_error",
///     "message": "ASR failed: ...",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            AppError::Decode(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "decode_error",
                msg.clone(),
            ),
            AppError::Transcription(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "transcription_error",
                msg.clone(),
            ),
            AppError::Synthesis(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "synthesis_error",
                msg.clone(),
            ),
            AppError::Render(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "render_error",
                msg.clone(),
            ),
            AppError::RenderInProgress(msg) => (
                actix_web::http::StatusCode::CONFLICT,
                "render_in_progress",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

impl From<crate::session::SessionError> for AppError {
    fn from(err: crate::session::SessionError) -> Self {
        use crate::session::SessionError;
        match err {
            SessionError::NotFound(_) => AppError::NotFound(err.to_string()),
            SessionError::CapacityReached(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<crate::pipeline::PipelineError> for AppError {
    fn from(err: crate::pipeline::PipelineError) -> Self {
        use crate::pipeline::PipelineError;
        match err {
            PipelineError::Session(inner) => inner.into(),
            PipelineError::Decode(msg) => AppError::Decode(msg),
            PipelineError::Transcription(msg) => AppError::Transcription(msg),
            PipelineError::Synthesis(msg) => AppError::Synthesis(msg),
            PipelineError::Storage(inner) => AppError::Internal(inner.to_string()),
        }
    }
}

impl From<crate::render::RenderError> for AppError {
    fn from(err: crate::render::RenderError) -> Self {
        use crate::render::RenderError;
        match err {
            RenderError::Session(inner) => inner.into(),
            RenderError::MissingVideo | RenderError::NoSegments => {
                AppError::ValidationError(err.to_string())
            }
            RenderError::AlreadyRunning => AppError::RenderInProgress(err.to_string()),
            RenderError::NoAudibleStreams => AppError::Render(err.to_string()),
            RenderError::Io(inner) => AppError::Internal(inner.to_string()),
            RenderError::Media(inner) => AppError::Render(inner.to_string()),
        }
    }
}

/// Shorthand for `Result<T, AppError>` used across handlers.
pub type AppResult<T> = Result<T, AppError>;
