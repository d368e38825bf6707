//! Client configuration

use std::path::PathBuf;
use std::time::Duration;
use ucare_auth::{AuthScheme, Credentials};

/// Default REST API host
pub const DEFAULT_API_BASE: &str = "https://api.uploadcare.com";

/// Default upload API host
pub const DEFAULT_UPLOAD_BASE: &str = "https://upload.uploadcare.com";

/// Default REST API version
pub const DEFAULT_API_VERSION: &str = "0.6";

/// Payloads larger than this go through a multipart session
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 10 * 1024 * 1024; // 10 MiB

/// Default size of one multipart part
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024; // 5 MiB

/// Polling policy for URL imports.
///
/// The wait starts at `interval`, doubles after every poll that shows no
/// progress (capped at `max_interval`) and snaps back to `interval` as soon as
/// progress increases. More than `max_retries` stalled polls in a row give up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Base wait between polls
    pub interval: Duration,
    /// Upper bound for the doubled wait
    pub max_interval: Duration,
    /// Stalled polls tolerated before timing out
    pub max_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            max_retries: 8,
        }
    }
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Project public key
    pub public_key: String,
    /// Project secret key; `None` makes an upload-only client
    pub secret_key: Option<String>,
    /// How signed requests are authorized
    pub auth_scheme: AuthScheme,
    /// REST API base URL
    pub api_base: String,
    /// Upload API base URL
    pub upload_base: String,
    /// REST API version sent in `Accept`
    pub api_version: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Multipart upload threshold (bytes)
    pub multipart_threshold: u64,
    /// Multipart chunk size (bytes)
    pub multipart_chunk_size: u64,
    /// Number of part uploads kept in flight
    pub part_concurrency: usize,
    /// URL import polling
    pub poll: PollPolicy,
    /// Directory for spooled stream uploads; system temp dir when `None`
    pub spool_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            secret_key: None,
            auth_scheme: AuthScheme::Signed,
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(60),
            user_agent: format!("ucare-rust/{}", env!("CARGO_PKG_VERSION")),
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_chunk_size: DEFAULT_CHUNK_SIZE,
            part_concurrency: 1,
            poll: PollPolicy::default(),
            spool_dir: None,
        }
    }
}

impl Config {
    /// Create a config for the given project keys
    pub fn new(public_key: impl Into<String>, secret_key: Option<String>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key,
            ..Default::default()
        }
    }

    /// Create an upload-only config
    pub fn upload_only(public_key: impl Into<String>) -> Self {
        Self::new(public_key, None)
    }

    /// Use the simple (clear-text secret) authorization scheme
    pub fn with_simple_auth(mut self) -> Self {
        self.auth_scheme = AuthScheme::Simple;
        self
    }

    /// Point the client at other hosts, e.g. a local mock
    pub fn with_bases(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set multipart threshold and chunk size
    pub fn with_multipart(mut self, threshold: u64, chunk_size: u64) -> Self {
        self.multipart_threshold = threshold;
        self.multipart_chunk_size = chunk_size;
        self
    }

    /// Upload up to `n` parts at once
    pub fn with_part_concurrency(mut self, n: usize) -> Self {
        self.part_concurrency = n.max(1);
        self
    }

    /// Set the URL import polling policy
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Spool stream uploads into `dir`
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    /// Credentials derived from the configured keys
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.public_key.clone(), self.secret_key.clone())
    }

    /// `Accept` header value for the REST API
    pub fn accept_header(&self) -> String {
        format!("application/vnd.uploadcare-v{}+json", self.api_version)
    }

    /// `User-Agent` header value, embeds the public key
    pub fn user_agent_header(&self) -> String {
        format!("{}/{}", self.user_agent, self.public_key)
    }
}
