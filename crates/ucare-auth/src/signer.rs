//! HMAC-SHA1 request signer

use crate::{AuthError, AuthScheme, CanonicalRequest, Credentials, Result};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::trace;

type HmacSha1 = Hmac<Sha1>;

/// Produces `Authorization` header values for API requests
#[derive(Clone, Debug)]
pub struct Signer {
    credentials: Credentials,
    scheme: AuthScheme,
}

impl Signer {
    /// Signer using the HMAC scheme
    pub fn new(credentials: Credentials) -> Self {
        Self::with_scheme(credentials, AuthScheme::Signed)
    }

    /// Signer using an explicit scheme
    pub fn with_scheme(credentials: Credentials, scheme: AuthScheme) -> Self {
        Self {
            credentials,
            scheme,
        }
    }

    /// The credentials this signer was built with
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The configured scheme
    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Hex HMAC-SHA1 of the canonical string, keyed by the secret key
    pub fn sign(&self, request: &CanonicalRequest) -> Result<String> {
        let secret = self.credentials.secret_key().ok_or(AuthError::MissingSecret)?;
        let canonical = request.to_string();
        trace!(canonical = %canonical, "signing request");

        let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        mac.update(canonical.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Full `Authorization` header value for the request.
    ///
    /// Both schemes fail with [`AuthError::MissingSecret`] when no secret is configured.
    pub fn authorization(&self, request: &CanonicalRequest) -> Result<String> {
        let credential = match self.scheme {
            AuthScheme::Signed => self.sign(request)?,
            AuthScheme::Simple => self
                .credentials
                .secret_key()
                .ok_or(AuthError::MissingSecret)?
                .to_string(),
        };
        Ok(format!(
            "{} {}:{}",
            self.scheme.prefix(),
            self.credentials.public_key(),
            credential
        ))
    }
}
