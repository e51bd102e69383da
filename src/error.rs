//! Error types for the PDF extractor service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for the PDF extractor service
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF extractor service
#[derive(Error, Debug)]
pub enum Error {
    /// Client input is malformed (missing field, bad JSON, wrong shape)
    #[error("{reason}")]
    Validation { reason: String },

    /// Uploaded part is neither a PDF nor generic binary
    #[error("File must be a PDF (got content type {content_type:?})")]
    UnsupportedContentType { content_type: Option<String> },

    /// URL could not be parsed
    #[error("Invalid URL: {reason}")]
    InvalidUrl { reason: String },

    /// URL scheme is not http or https
    #[error("Unsupported URL scheme: {scheme} (only http and https are allowed)")]
    InvalidUrlScheme { scheme: String },

    /// URL resolves to a private/reserved address while the guard is enabled
    #[error("URL not allowed: {url}")]
    BlockedUrl { url: String },

    /// Remote response does not look like a PDF
    #[error("URL does not appear to be a PDF (content type {content_type:?})")]
    NotPdfContentType { content_type: String },

    /// Upload or download exceeds the configured maximum
    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    TooLarge { size: u64, max_size: u64 },

    /// Request body tripped the body limit before the size was known
    #[error("Request body too large (max: {max_size} bytes)")]
    BodyTooLarge { max_size: u64 },

    /// Document could not be parsed as a PDF
    #[error("PDF parse failed: {reason}")]
    Parse { reason: String },

    /// Upstream server answered with a non-success status
    #[error("Failed to download URL: upstream returned {status}")]
    UpstreamStatus { status: u16 },

    /// Connection, timeout or body transfer failure while fetching
    #[error("Failed to download URL: {reason}")]
    Network { reason: String },

    /// Unexpected failure inside the service
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

/// Coarse classification of [`Error`], used to pick the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    SizeLimitExceeded,
    ParseFailure,
    FetchFailure,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::SizeLimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::ParseFailure => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::FetchFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::SizeLimitExceeded => "size_limit_exceeded",
            ErrorKind::ParseFailure => "parse_failure",
            ErrorKind::FetchFailure => "fetch_failure",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl Error {
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    pub fn parse(reason: impl std::fmt::Display) -> Self {
        Error::Parse {
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. }
            | Error::UnsupportedContentType { .. }
            | Error::InvalidUrl { .. }
            | Error::InvalidUrlScheme { .. }
            | Error::BlockedUrl { .. }
            | Error::NotPdfContentType { .. } => ErrorKind::Validation,
            Error::TooLarge { .. } | Error::BodyTooLarge { .. } => ErrorKind::SizeLimitExceeded,
            Error::Parse { .. } => ErrorKind::ParseFailure,
            Error::UpstreamStatus { .. } | Error::Network { .. } => ErrorKind::FetchFailure,
            Error::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Message sent to clients. Internal failures are reduced to a generic
    /// message; everything else is reported as-is.
    pub fn client_message(&self) -> String {
        match self {
            Error::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's own message omits the underlying cause (timeout, refused, ...)
        let mut reason = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            reason.push_str(": ");
            reason.push_str(&cause.to_string());
            source = cause.source();
        }
        Error::Network { reason }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        match kind {
            ErrorKind::Internal => tracing::error!(error = %self, "request failed"),
            ErrorKind::FetchFailure => tracing::warn!(error = %self, "remote fetch failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let body = Json(ErrorResponse {
            error: kind.as_str(),
            detail: self.client_message(),
        });

        (kind.status(), body).into_response()
    }
}
