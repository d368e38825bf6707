//! Canonical request strings
//!
//! The string that gets signed is five newline-joined fields:
//!
//! ```text
//! METHOD
//! MD5(body), lowercase hex
//! Content-Type
//! Date
//! /raw/path/?raw=query
//! ```

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::fmt;

/// MD5 of the empty string, used for requests without a body
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Hex MD5 of a request body
pub fn body_md5(body: &[u8]) -> String {
    if body.is_empty() {
        return EMPTY_MD5.to_string();
    }
    let mut hasher = Md5::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// RFC-2822 date in GMT, e.g. `Fri, 17 Nov 1989 00:00:00 +0000`
pub fn rfc2822(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S %z").to_string()
}

/// ISO-8601 date without offset, used by collection filters
pub fn iso8601(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// The request attributes that take part in a signature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    body_md5: String,
    content_type: String,
    date: String,
    path_and_query: String,
}

impl CanonicalRequest {
    /// Build a canonical request.
    ///
    /// `path_and_query` is the raw path with its raw query (no scheme or host).
    pub fn new(
        method: impl Into<String>,
        body: &[u8],
        content_type: impl Into<String>,
        date: impl Into<String>,
        path_and_query: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into().to_uppercase(),
            body_md5: body_md5(body),
            content_type: content_type.into(),
            date: date.into(),
            path_and_query: path_and_query.into(),
        }
    }

    /// Hex MD5 of the body
    pub fn body_md5(&self) -> &str {
        &self.body_md5
    }

    /// The date as it appears in the `Date` header
    pub fn date(&self) -> &str {
        &self.date
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}\n{}",
            self.method, self.body_md5, self.content_type, self.date, self.path_and_query
        )
    }
}
