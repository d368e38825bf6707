//! Blocking facade over [`Client`](crate::Client)
//!
//! Each call runs to completion on the caller's thread, driven by a
//! current-thread runtime owned by the client. Do not use it from inside an
//! async context.
//!
//! ```rust,ignore
//! use ucare_client::{blocking, Config};
//!
//! let client = blocking::Client::new(Config::new("pub", Some("secret".into())))?;
//! for file in client.iter(client.files().stored(true).paginate()) {
//!     println!("{}", file?.uuid);
//! }
//! ```

use crate::client::BatchOutcome;
use crate::import::AsyncImporter;
use crate::multipart::{ChunkedUploader, UploadOptions, UploadSource};
use crate::pagination::{PageStyle, Paginator};
use crate::query::{FilesQuery, GroupsQuery};
use crate::types::{CopiedFile, CopyTarget, File, Group, Project, UploadSignature};
use crate::{Config, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Synchronous Uploadcare client
#[derive(Clone, Debug)]
pub struct Client {
    inner: crate::Client,
    runtime: Arc<Runtime>,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            inner: crate::Client::new(config)?,
            runtime: Arc::new(runtime),
        })
    }

    /// The async client underneath
    pub fn as_async(&self) -> &crate::Client {
        &self.inner
    }

    pub fn get_project(&self) -> Result<Project> {
        self.runtime.block_on(self.inner.get_project())
    }

    pub fn get_file(&self, file_id: &str) -> Result<File> {
        self.runtime.block_on(self.inner.get_file(file_id))
    }

    pub fn get_uploaded_file(&self, file_id: &str) -> Result<File> {
        self.runtime.block_on(self.inner.get_uploaded_file(file_id))
    }

    pub fn get_group(&self, group_id: &str) -> Result<Group> {
        self.runtime.block_on(self.inner.get_group(group_id))
    }

    pub fn get_uploaded_group(&self, group_id: &str) -> Result<Group> {
        self.runtime.block_on(self.inner.get_uploaded_group(group_id))
    }

    pub fn create_group<S: AsRef<str>>(
        &self,
        file_ids: &[S],
        signature: Option<&UploadSignature>,
    ) -> Result<Group> {
        self.runtime
            .block_on(self.inner.create_group(file_ids, signature))
    }

    pub fn store_group(&self, group_id: &str) -> Result<()> {
        self.runtime.block_on(self.inner.store_group(group_id))
    }

    pub fn copy_file(&self, file_id: &str, target: &CopyTarget) -> Result<CopiedFile> {
        self.runtime.block_on(self.inner.copy_file(file_id, target))
    }

    pub fn store_file(&self, file_id: &str) -> Result<File> {
        self.runtime.block_on(self.inner.store_file(file_id))
    }

    pub fn delete_file(&self, file_id: &str) -> Result<File> {
        self.runtime.block_on(self.inner.delete_file(file_id))
    }

    pub fn store_files<S: AsRef<str>>(&self, file_ids: &[S]) -> Result<BatchOutcome> {
        self.runtime.block_on(self.inner.store_files(file_ids))
    }

    pub fn delete_files<S: AsRef<str>>(&self, file_ids: &[S]) -> Result<BatchOutcome> {
        self.runtime.block_on(self.inner.delete_files(file_ids))
    }

    /// Query builder over the project's files; iterate it with [`Client::iter`]
    pub fn files(&self) -> FilesQuery {
        self.inner.files()
    }

    /// Query builder over the project's groups; iterate it with [`Client::iter`]
    pub fn groups(&self) -> GroupsQuery {
        self.inner.groups()
    }

    /// Lazy sequence over any collection endpoint
    pub fn paginate<T: DeserializeOwned + 'static>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
        style: PageStyle,
    ) -> Result<Iter<T>> {
        Ok(self.iter(self.inner.paginate(path, params, style)?))
    }

    /// Drive a paginator as a plain iterator
    pub fn iter<T>(&self, paginator: Paginator<T>) -> Iter<T> {
        Iter {
            runtime: Arc::clone(&self.runtime),
            paginator,
        }
    }

    pub fn upload(&self, source: UploadSource, options: &UploadOptions) -> Result<File> {
        self.runtime.block_on(self.inner.upload(source, options))
    }

    /// Upload with a configured uploader, e.g. one with a progress callback
    pub fn upload_with(
        &self,
        uploader: &ChunkedUploader,
        source: UploadSource,
        options: &UploadOptions,
    ) -> Result<File> {
        self.runtime.block_on(uploader.upload(source, options))
    }

    pub fn uploader(&self) -> ChunkedUploader {
        self.inner.uploader()
    }

    pub fn import_from_url(&self, source_url: &str, options: &UploadOptions) -> Result<File> {
        self.runtime
            .block_on(self.inner.import_from_url(source_url, options))
    }

    /// Import with a configured importer, e.g. one with a status callback
    pub fn import_with(
        &self,
        importer: &AsyncImporter,
        source_url: &str,
        options: &UploadOptions,
    ) -> Result<File> {
        self.runtime.block_on(importer.import(source_url, options))
    }

    pub fn importer(&self) -> AsyncImporter {
        self.inner.importer()
    }
}

/// Blocking iterator over a paginated collection
#[derive(Debug)]
pub struct Iter<T> {
    runtime: Arc<Runtime>,
    paginator: Paginator<T>,
}

impl<T> Iter<T> {
    /// Number of page requests issued so far
    pub fn pages_fetched(&self) -> usize {
        self.paginator.pages_fetched()
    }
}

impl<T> Iterator for Iter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.paginator.next())
    }
}
