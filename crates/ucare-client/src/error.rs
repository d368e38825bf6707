//! Client error types

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// 401/403, or a secret key is required but missing
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 400/404
    #[error("Invalid request ({status}): {detail}")]
    InvalidRequest { status: u16, detail: String },

    /// 429
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service rejected the upload, or it could not be carried out
    #[error("Upload failed: {}", .detail.as_deref().unwrap_or("unknown reason"))]
    UploadFailure {
        detail: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Classify a non-success response
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Authentication(body),
            400 | 404 => Self::InvalidRequest {
                status: status.as_u16(),
                detail: body,
            },
            429 => Self::RateLimited(body),
            code => Self::Api { status: code, body },
        }
    }

    /// Upload failure with a server-supplied or local detail
    pub fn upload_failure(detail: impl Into<String>) -> Self {
        Self::UploadFailure {
            detail: Some(detail.into()),
            source: None,
        }
    }

    /// Upload failure caused by another error
    pub fn upload_failure_from(
        detail: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::UploadFailure {
            detail: Some(detail.into()),
            source: Some(Box::new(source)),
        }
    }

    /// URL import gave up after the retry budget ran out
    pub fn timeout() -> Self {
        Self::upload_failure("Timeout")
    }

    /// Credentials or request were rejected
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Transport failed before a status line arrived
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Upload or import was rejected by the service
    pub fn is_upload_failure(&self) -> bool {
        matches!(self, Self::UploadFailure { .. })
    }

    /// URL import polling ran out of retries
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UploadFailure { detail: Some(d), .. } if d == "Timeout")
    }
}

impl From<ucare_auth::AuthError> for ClientError {
    fn from(err: ucare_auth::AuthError) -> Self {
        Self::Authentication(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {}", err))
    }
}
