//! Project credentials

use std::fmt;

/// How the `Authorization` header is produced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Uploadcare <public>:<hmac-sha1 signature>`
    #[default]
    Signed,
    /// `Uploadcare.Simple <public>:<secret>`, sends the secret in clear text
    Simple,
}

impl AuthScheme {
    /// Header prefix for this scheme
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Signed => "Uploadcare",
            Self::Simple => "Uploadcare.Simple",
        }
    }
}

/// Public key and optional secret key of a project.
///
/// Without a secret only the upload API is usable.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    public_key: String,
    secret_key: Option<String>,
}

impl Credentials {
    /// Create credentials from a public key and an optional secret key
    pub fn new(public_key: impl Into<String>, secret_key: Option<impl Into<String>>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.map(Into::into),
        }
    }

    /// Credentials that can only upload
    pub fn upload_only(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: None,
        }
    }

    /// The public key
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// The secret key, if any
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    /// Whether a secret key is present
    pub fn has_secret(&self) -> bool {
        self.secret_key.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_only_has_no_secret() {
        let creds = Credentials::upload_only("pub");
        assert_eq!(creds.public_key(), "pub");
        assert!(!creds.has_secret());
        assert_eq!(creds.secret_key(), None);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("pub", Some("topsecret"));
        let debug = format!("{:?}", creds);
        assert!(debug.contains("pub"));
        assert!(!debug.contains("topsecret"));
    }

    #[test]
    fn test_scheme_prefix() {
        assert_eq!(AuthScheme::Signed.prefix(), "Uploadcare");
        assert_eq!(AuthScheme::Simple.prefix(), "Uploadcare.Simple");
        assert_eq!(AuthScheme::default(), AuthScheme::Signed);
    }
}
