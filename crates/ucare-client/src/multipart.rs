//! Direct and multipart uploads
//!
//! Payloads up to the configured threshold go out as one form POST. Larger
//! payloads open a multipart session, PUT fixed-size chunks to the part URLs
//! handed out by the server and then complete the session.
//!
//! A stream source is spooled to a temporary file first because the session
//! needs the total size up front. The spool is a [`NamedTempFile`] owned by the
//! upload call, so it is removed on every exit path.

use crate::client::fetch_uploaded_file;
use crate::transport::{ApiRequest, Transport};
use crate::types::{File, StorePolicy, UploadSignature};
use crate::urls::Endpoints;
use crate::{ClientError, Config, Result};
use bytes::Bytes;
use futures::{stream, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument};
use url::Url;

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Upload progress information
#[derive(Clone, Debug)]
pub struct UploadProgress {
    /// Bytes uploaded so far
    pub bytes_uploaded: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
    /// Parts finished so far
    pub current_part: u32,
    /// Total number of parts
    pub total_parts: u32,
}

impl UploadProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_uploaded as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Where the bytes of an upload come from
pub enum UploadSource {
    /// A file on disk; the filename defaults to the last path component
    Path(PathBuf),
    /// An in-memory buffer
    Bytes { data: Bytes, filename: String },
    /// A stream of unknown length, spooled before upload
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        filename: String,
    },
}

impl UploadSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(data: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            filename: filename.into(),
        }
    }

    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static, filename: impl Into<String>) -> Self {
        Self::Reader {
            reader: Box::new(reader),
            filename: filename.into(),
        }
    }

    fn filename(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
            Self::Bytes { filename, .. } | Self::Reader { filename, .. } => filename.clone(),
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes { data, filename } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("filename", filename)
                .finish(),
            Self::Reader { filename, .. } => {
                f.debug_struct("Reader").field("filename", filename).finish()
            }
        }
    }
}

/// Per-upload settings, shared by file uploads and URL imports
#[derive(Clone, Debug, Default)]
pub struct UploadOptions {
    /// Overrides the filename taken from the source
    pub filename: Option<String>,
    /// Overrides the type guessed from the filename
    pub content_type: Option<String>,
    pub store: StorePolicy,
    /// Forwarded only when complete
    pub signature: Option<UploadSignature>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_store(mut self, store: StorePolicy) -> Self {
        self.store = store;
        self
    }

    pub fn with_signature(mut self, signature: UploadSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Signature pair to send, if any
    pub(crate) fn complete_signature(&self) -> Option<&UploadSignature> {
        self.signature.as_ref().filter(|s| s.is_complete())
    }
}

/// Append `signature` and `expire` when both are present
pub(crate) fn with_signature(form: Form, signature: Option<&UploadSignature>) -> Form {
    match signature.filter(|s| s.is_complete()) {
        Some(s) => form
            .text("signature", s.signature.clone())
            .text("expire", s.expire.clone()),
        None => form,
    }
}

/// Number of `chunk_size` windows needed for `size` bytes
pub fn part_count(size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size)
}

#[derive(Deserialize)]
struct DirectResponse {
    file: String,
}

#[derive(Deserialize)]
struct StartResponse {
    uuid: String,
    parts: Vec<String>,
    #[serde(default)]
    chunk_size: Option<u64>,
}

#[derive(Deserialize)]
struct CompleteResponse {
    uuid: String,
}

/// Payload with a known length
enum Staged {
    Memory(Bytes),
    Disk {
        path: PathBuf,
        size: u64,
        // Dropping the handle removes the spool.
        _spool: Option<NamedTempFile>,
    },
}

impl Staged {
    fn size(&self) -> u64 {
        match self {
            Self::Memory(data) => data.len() as u64,
            Self::Disk { size, .. } => *size,
        }
    }

    async fn into_bytes(self) -> Result<Bytes> {
        match self {
            Self::Memory(data) => Ok(data),
            Self::Disk { path, .. } => tokio::fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(|e| ClientError::upload_failure_from("failed to read upload source", e)),
        }
    }
}

/// Sequential fixed-size windows over a staged payload
enum ChunkReader {
    Memory {
        data: Bytes,
        offset: usize,
        chunk_size: usize,
    },
    Disk {
        file: tokio::fs::File,
        remaining: u64,
        chunk_size: u64,
    },
}

impl ChunkReader {
    async fn open(staged: &Staged, chunk_size: u64) -> Result<Self> {
        match staged {
            Staged::Memory(data) => Ok(Self::Memory {
                data: data.clone(),
                offset: 0,
                chunk_size: chunk_size as usize,
            }),
            Staged::Disk { path, size, .. } => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| ClientError::upload_failure_from("failed to open upload source", e))?;
                Ok(Self::Disk {
                    file,
                    remaining: *size,
                    chunk_size,
                })
            }
        }
    }

    /// Next window; the last one may be short
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self {
            Self::Memory {
                data,
                offset,
                chunk_size,
            } => {
                if *offset >= data.len() {
                    return Ok(None);
                }
                let end = (*offset + *chunk_size).min(data.len());
                let chunk = data.slice(*offset..end);
                *offset = end;
                Ok(Some(chunk))
            }
            Self::Disk {
                file,
                remaining,
                chunk_size,
            } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                let len = (*remaining).min(*chunk_size) as usize;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf)
                    .await
                    .map_err(|e| ClientError::upload_failure_from("failed to read upload source", e))?;
                *remaining -= len as u64;
                Ok(Some(Bytes::from(buf)))
            }
        }
    }
}

/// Uploads one payload per call, choosing direct or multipart by size
pub struct ChunkedUploader {
    transport: Transport,
    endpoints: Endpoints,
    threshold: u64,
    chunk_size: u64,
    concurrency: usize,
    spool_dir: Option<PathBuf>,
    progress: Option<ProgressCallback>,
}

impl ChunkedUploader {
    pub(crate) fn new(transport: Transport, endpoints: Endpoints, config: &Config) -> Self {
        Self {
            transport,
            endpoints,
            threshold: config.multipart_threshold,
            chunk_size: config.multipart_chunk_size.max(1),
            concurrency: config.part_concurrency.max(1),
            spool_dir: config.spool_dir.clone(),
            progress: None,
        }
    }

    /// Report progress after each finished part
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Upload and return the stored file.
    ///
    /// The file is looked up through the REST API when a secret key is
    /// configured, through the public upload info endpoint otherwise.
    pub async fn upload(&self, source: UploadSource, options: &UploadOptions) -> Result<File> {
        let file_id = self.upload_id(source, options).await?;
        fetch_uploaded_file(&self.transport, &self.endpoints, &file_id).await
    }

    /// Upload and return only the new file id
    #[instrument(skip_all)]
    pub async fn upload_id(&self, source: UploadSource, options: &UploadOptions) -> Result<String> {
        let filename = options.filename.clone().unwrap_or_else(|| source.filename());
        let content_type = options.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .to_string()
        });

        let staged = self.stage(source).await?;
        let size = staged.size();
        debug!(%filename, %content_type, size, "upload staged");

        let file_id = if size <= self.threshold {
            self.upload_direct(staged, &filename, &content_type, options).await?
        } else {
            self.upload_multipart(&staged, &filename, &content_type, options).await?
        };

        info!(%filename, %file_id, size, "upload finished");
        Ok(file_id)
    }

    async fn stage(&self, source: UploadSource) -> Result<Staged> {
        match source {
            UploadSource::Bytes { data, .. } => Ok(Staged::Memory(data)),
            UploadSource::Path(path) => {
                let size = tokio::fs::metadata(&path)
                    .await
                    .map_err(|e| ClientError::upload_failure_from("failed to stat upload source", e))?
                    .len();
                Ok(Staged::Disk {
                    path,
                    size,
                    _spool: None,
                })
            }
            UploadSource::Reader { mut reader, .. } => {
                let spool = self.spool_file()?;
                let path = spool.path().to_path_buf();
                let size = spool_into(&mut reader, &spool).await?;
                debug!(path = %path.display(), size, "stream spooled");
                Ok(Staged::Disk {
                    path,
                    size,
                    _spool: Some(spool),
                })
            }
        }
    }

    fn spool_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ucare-spool-");
        let spool = match &self.spool_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        spool.map_err(|e| ClientError::upload_failure_from("failed to create spool file", e))
    }

    async fn upload_direct(
        &self,
        staged: Staged,
        filename: &str,
        content_type: &str,
        options: &UploadOptions,
    ) -> Result<String> {
        let data = staged.into_bytes().await?;
        let total_bytes = data.len() as u64;
        let part = Part::stream_with_length(data, total_bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| ClientError::Config(format!("invalid content type {:?}: {}", content_type, e)))?;
        let form = self.base_form(options).part("file", part);

        let request = ApiRequest::upload(Method::POST, self.endpoints.upload_direct()?).form(form);
        let response: DirectResponse = self.transport.execute_json(request).await?;

        self.report(UploadProgress {
            bytes_uploaded: total_bytes,
            total_bytes,
            current_part: 1,
            total_parts: 1,
        });
        Ok(response.file)
    }

    async fn upload_multipart(
        &self,
        staged: &Staged,
        filename: &str,
        content_type: &str,
        options: &UploadOptions,
    ) -> Result<String> {
        let size = staged.size();
        let form = self
            .base_form(options)
            .text("filename", filename.to_string())
            .text("size", size.to_string())
            .text("content_type", content_type.to_string());
        let request = ApiRequest::upload(Method::POST, self.endpoints.multipart_start()?).form(form);
        let session: StartResponse = self.transport.execute_json(request).await?;

        let chunk_size = session.chunk_size.filter(|c| *c > 0).unwrap_or(self.chunk_size);
        let expected = part_count(size, chunk_size);
        if session.parts.len() as u64 != expected {
            return Err(ClientError::upload_failure(format!(
                "server returned {} part URLs for {} chunks",
                session.parts.len(),
                expected
            )));
        }
        debug!(uuid = %session.uuid, parts = expected, chunk_size, "multipart session started");

        self.upload_parts(staged, session.parts, chunk_size, content_type)
            .await?;

        let form = Form::new()
            .text("UPLOADCARE_PUB_KEY", self.transport.credentials().public_key().to_string())
            .text("uuid", session.uuid);
        let request =
            ApiRequest::upload(Method::POST, self.endpoints.multipart_complete()?).form(form);
        let completed: CompleteResponse = self.transport.execute_json(request).await?;
        Ok(completed.uuid)
    }

    /// Read windows in order and PUT them, keeping up to `concurrency` in flight
    async fn upload_parts(
        &self,
        staged: &Staged,
        urls: Vec<String>,
        chunk_size: u64,
        content_type: &str,
    ) -> Result<()> {
        let total_bytes = staged.size();
        let total_parts = urls.len() as u32;
        let reader = ChunkReader::open(staged, chunk_size).await?;

        let chunks = stream::try_unfold(
            (reader, urls.into_iter().enumerate()),
            |(mut reader, mut urls)| async move {
                let Some((index, url)) = urls.next() else {
                    return Ok(None);
                };
                let chunk = reader.next_chunk().await?.ok_or_else(|| {
                    ClientError::upload_failure("upload source ended before the last part")
                })?;
                Ok::<_, ClientError>(Some(((index, url, chunk), (reader, urls))))
            },
        );

        let puts = chunks
            .map_ok(|(index, url, chunk)| {
                let transport = self.transport.clone();
                let content_type = content_type.to_string();
                async move {
                    let len = chunk.len() as u64;
                    let url = Url::parse(&url).map_err(|e| {
                        ClientError::InvalidResponse(format!("invalid part URL {:?}: {}", url, e))
                    })?;
                    debug!(part = index, len, "uploading part");
                    transport
                        .execute(ApiRequest::upload(Method::PUT, url).raw(chunk, content_type))
                        .await?;
                    Ok::<_, ClientError>(len)
                }
            })
            .try_buffered(self.concurrency);
        let mut puts = Box::pin(puts);

        let mut bytes_uploaded = 0u64;
        let mut current_part = 0u32;
        while let Some(len) = puts.try_next().await? {
            bytes_uploaded += len;
            current_part += 1;
            self.report(UploadProgress {
                bytes_uploaded,
                total_bytes,
                current_part,
                total_parts,
            });
        }
        Ok(())
    }

    fn base_form(&self, options: &UploadOptions) -> Form {
        let form = Form::new()
            .text("UPLOADCARE_PUB_KEY", self.transport.credentials().public_key().to_string())
            .text("UPLOADCARE_STORE", options.store.as_str());
        with_signature(form, options.complete_signature())
    }

    fn report(&self, progress: UploadProgress) {
        if let Some(ref cb) = self.progress {
            cb(progress);
        }
    }
}

impl fmt::Debug for ChunkedUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedUploader")
            .field("threshold", &self.threshold)
            .field("chunk_size", &self.chunk_size)
            .field("concurrency", &self.concurrency)
            .field("spool_dir", &self.spool_dir)
            .finish()
    }
}

/// Copy a stream into the spool file and return the byte count
async fn spool_into<R: AsyncRead + Unpin + ?Sized>(reader: &mut R, spool: &NamedTempFile) -> Result<u64> {
    let spool_failure = |e: std::io::Error| ClientError::upload_failure_from("failed to spool upload stream", e);
    let handle = spool.reopen().map_err(spool_failure)?;
    let mut out = tokio::fs::File::from_std(handle);
    let size = tokio::io::copy(reader, &mut out).await.map_err(spool_failure)?;
    out.flush().await.map_err(spool_failure)?;
    Ok(size)
}

/// Whether `path` is a spool file created by this module
pub fn is_spool_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("ucare-spool-"))
}
