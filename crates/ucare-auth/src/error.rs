//! Error types for the ucare-auth crate

use thiserror::Error;

/// Result type alias using `AuthError`
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while authenticating a request
#[derive(Error, Debug)]
pub enum AuthError {
    /// The request needs a secret key but the credentials only carry a public key
    #[error("secret key is required for this request")]
    MissingSecret,

    /// The secret key could not be used as an HMAC key
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
