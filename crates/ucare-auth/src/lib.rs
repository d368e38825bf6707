//! # Uploadcare Auth
//!
//! Request authentication for the Uploadcare REST API.
//!
//! This crate provides:
//! - **Credentials**: public key plus optional secret key
//! - **Canonical strings**: the fixed-order request summary that gets signed
//! - **Signatures**: HMAC-SHA1 over the canonical string, hex-encoded
//! - **Authorization headers**: signed (`Uploadcare`) and simple (`Uploadcare.Simple`) schemes
//!
//! ## Example
//!
//! ```rust
//! use ucare_auth::{CanonicalRequest, Credentials, Signer};
//!
//! let signer = Signer::new(Credentials::new("demopublickey", Some("demosecretkey")));
//! let request = CanonicalRequest::new(
//!     "GET",
//!     b"",
//!     "application/json",
//!     "Fri, 17 Nov 1989 00:00:00 +0000",
//!     "/files/27c7846b-a019-4516-a5e4-de635f822161/",
//! );
//!
//! let header = signer.authorization(&request).unwrap();
//! assert_eq!(
//!     header,
//!     "Uploadcare demopublickey:535e263808dd38599343f04aab3c9f34bb15573c"
//! );
//! ```

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod signer;

pub use canonical::{body_md5, iso8601, rfc2822, CanonicalRequest, EMPTY_MD5};
pub use credentials::{AuthScheme, Credentials};
pub use error::{AuthError, Result};
pub use signer::Signer;

/// Content type every signed API request declares
pub const JSON_CONTENT_TYPE: &str = "application/json";
