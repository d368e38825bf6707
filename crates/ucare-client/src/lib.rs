//! # Uploadcare Client SDK
//!
//! Client engine for the Uploadcare REST and upload APIs.
//!
//! ## Features
//!
//! - **Signed requests**: every REST call carries an HMAC-SHA1 `Authorization` header
//! - **Lazy pagination**: cursor and numeric continuation behind one [`Paginator`]
//! - **Chunked uploads**: direct POST for small payloads, multipart sessions for large ones
//! - **URL imports**: submit and poll with bounded exponential backoff
//! - **Blocking facade**: [`blocking::Client`] for callers without a runtime
//!
//! ## Example
//!
//! ```rust,ignore
//! use ucare_client::{Client, Config, UploadOptions, UploadSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new(Config::new("publickey", Some("secretkey".to_string())))?;
//!
//!     // Upload a file
//!     let file = client
//!         .upload(UploadSource::path("photo.jpg"), &UploadOptions::new())
//!         .await?;
//!
//!     // Keep it
//!     client.store_file(&file.uuid).await?;
//!
//!     // List stored files
//!     let mut files = client.files().stored(true).paginate();
//!     while let Some(file) = files.next().await {
//!         println!("{}", file?.uuid);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod blocking;
mod client;
mod config;
mod error;
mod import;
mod multipart;
mod pagination;
mod query;
mod transport;
mod types;
mod urls;

pub use client::{BatchOutcome, Client, MAX_BATCH_SIZE};
pub use config::{
    Config, PollPolicy, DEFAULT_API_BASE, DEFAULT_API_VERSION, DEFAULT_CHUNK_SIZE,
    DEFAULT_MULTIPART_THRESHOLD, DEFAULT_UPLOAD_BASE,
};
pub use error::{ClientError, Result};
pub use import::{
    AsyncImporter, ImportCallback, ImportJob, ImportStatus, PollDecision, PollState,
};
pub use multipart::{
    is_spool_file, part_count, ChunkedUploader, ProgressCallback, UploadOptions, UploadProgress,
    UploadSource,
};
pub use pagination::{Page, PageDecoder, PageStyle, Paginator};
pub use query::{FilesQuery, GroupsQuery, Ordering};
pub use transport::{ApiRequest, Payload, Transport};
pub use types::*;
pub use urls::{path_and_query, Endpoints};

// Re-export the signing layer
pub use ucare_auth::{AuthScheme, Credentials, Signer};
