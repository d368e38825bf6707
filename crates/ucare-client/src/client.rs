//! Main client implementation

use crate::import::AsyncImporter;
use crate::multipart::{with_signature, ChunkedUploader, UploadOptions, UploadSource};
use crate::pagination::{PageStyle, Paginator};
use crate::query::{FilesQuery, GroupsQuery};
use crate::transport::{ApiRequest, Transport};
use crate::types::{CopiedFile, CopyTarget, File, Group, Project, UploadSignature};
use crate::urls::Endpoints;
use crate::{ClientError, Config, Result};
use reqwest::multipart::Form;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Most ids accepted by one batch storage request
pub const MAX_BATCH_SIZE: usize = 100;

/// Combined outcome of a batch store or delete
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchOutcome {
    /// Files the command was applied to
    pub result: Vec<File>,
    /// Rejected ids with the reason
    pub problems: HashMap<String, String>,
}

impl BatchOutcome {
    fn merge(&mut self, other: BatchOutcome) {
        self.result.extend(other.result);
        self.problems.extend(other.problems);
    }
}

#[derive(Deserialize)]
struct CopyResponse {
    #[serde(rename = "type")]
    kind: String,
    result: serde_json::Value,
}

impl CopyResponse {
    fn into_copied(self) -> Result<CopiedFile> {
        match self.kind.as_str() {
            "file" => Ok(CopiedFile::File(serde_json::from_value(self.result)?)),
            "url" => match self.result {
                serde_json::Value::String(url) => Ok(CopiedFile::Url(url)),
                other => Err(ClientError::InvalidResponse(format!(
                    "copy result is not a URL: {}",
                    other
                ))),
            },
            kind => Err(ClientError::InvalidResponse(format!(
                "unknown copy result type {:?}",
                kind
            ))),
        }
    }
}

/// Uploadcare API client
#[derive(Clone, Debug)]
pub struct Client {
    config: Config,
    transport: Transport,
    endpoints: Endpoints,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Self::with_transport(config, transport)
    }

    /// Create a client that sends through an existing transport
    pub fn with_transport(config: Config, transport: Transport) -> Result<Self> {
        let endpoints = Endpoints::new(&config)?;
        Ok(Self {
            config,
            transport,
            endpoints,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared transport
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Resolved endpoints
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ==================== Resources ====================

    /// Project the keys belong to
    #[instrument(skip(self))]
    pub async fn get_project(&self) -> Result<Project> {
        self.get(self.endpoints.project()?).await
    }

    /// File by id, through the REST API
    #[instrument(skip(self))]
    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.get(self.endpoints.file(file_id)?).await
    }

    /// File by id, through the public upload info endpoint
    #[instrument(skip(self))]
    pub async fn get_uploaded_file(&self, file_id: &str) -> Result<File> {
        let url = self
            .endpoints
            .uploaded_file(self.transport.credentials().public_key(), file_id)?;
        self.transport
            .execute_json(ApiRequest::upload(Method::GET, url))
            .await
    }

    /// File by id, through whichever lookup the credentials allow
    pub async fn resolve_file(&self, file_id: &str) -> Result<File> {
        fetch_uploaded_file(&self.transport, &self.endpoints, file_id).await
    }

    /// Group by id
    #[instrument(skip(self))]
    pub async fn get_group(&self, group_id: &str) -> Result<Group> {
        self.get(self.endpoints.group(group_id)?).await
    }

    /// Group by id, through the public upload info endpoint
    #[instrument(skip(self))]
    pub async fn get_uploaded_group(&self, group_id: &str) -> Result<Group> {
        let url = self
            .endpoints
            .uploaded_group(self.transport.credentials().public_key(), group_id)?;
        self.transport
            .execute_json(ApiRequest::upload(Method::GET, url))
            .await
    }

    // ==================== Groups ====================

    /// Join uploaded files into a new group, in the given order.
    ///
    /// Needs only the public key; `signature` is sent when complete.
    #[instrument(skip(self, file_ids, signature), fields(count = file_ids.len()))]
    pub async fn create_group<S: AsRef<str>>(
        &self,
        file_ids: &[S],
        signature: Option<&UploadSignature>,
    ) -> Result<Group> {
        let mut form = Form::new().text(
            "pub_key",
            self.transport.credentials().public_key().to_string(),
        );
        for (i, id) in file_ids.iter().enumerate() {
            form = form.text(format!("files[{}]", i), id.as_ref().to_string());
        }
        let form = with_signature(form, signature);

        let request = ApiRequest::upload(Method::POST, self.endpoints.create_group()?).form(form);
        let group: Group = self.transport.execute_json(request).await?;
        debug!(id = %group.id, files = group.files_count, "group created");
        Ok(group)
    }

    /// Store every file of a group
    #[instrument(skip(self))]
    pub async fn store_group(&self, group_id: &str) -> Result<()> {
        let url = self.endpoints.group_storage(group_id)?;
        self.transport
            .execute(ApiRequest::api(Method::PUT, url))
            .await?;
        Ok(())
    }

    // ==================== Storage ====================

    /// Keep a file beyond the retention window
    #[instrument(skip(self))]
    pub async fn store_file(&self, file_id: &str) -> Result<File> {
        let url = self.endpoints.file_storage(file_id)?;
        self.transport
            .execute_json(ApiRequest::api(Method::PUT, url))
            .await
    }

    /// Remove a file
    #[instrument(skip(self))]
    pub async fn delete_file(&self, file_id: &str) -> Result<File> {
        let url = self.endpoints.file(file_id)?;
        self.transport
            .execute_json(ApiRequest::api(Method::DELETE, url))
            .await
    }

    /// Store many files, [`MAX_BATCH_SIZE`] ids per request
    pub async fn store_files<S: AsRef<str>>(&self, file_ids: &[S]) -> Result<BatchOutcome> {
        self.batch(Method::PUT, file_ids).await
    }

    /// Delete many files, [`MAX_BATCH_SIZE`] ids per request
    pub async fn delete_files<S: AsRef<str>>(&self, file_ids: &[S]) -> Result<BatchOutcome> {
        self.batch(Method::DELETE, file_ids).await
    }

    /// Copy a file into project storage or a custom storage.
    ///
    /// The source may be stored or just uploaded, but not deleted.
    #[instrument(skip(self))]
    pub async fn copy_file(&self, file_id: &str, target: &CopyTarget) -> Result<CopiedFile> {
        let (url, body) = match target {
            CopyTarget::Local { store, make_public } => (
                self.endpoints.local_copy()?,
                json!({
                    "source": file_id,
                    "store": store.to_string(),
                    "make_public": make_public.to_string(),
                }),
            ),
            CopyTarget::Remote {
                target,
                make_public,
                pattern,
            } => {
                let mut body = json!({
                    "source": file_id,
                    "target": target,
                    "make_public": make_public.to_string(),
                });
                if let Some(pattern) = pattern {
                    body["pattern"] = json!(pattern);
                }
                (self.endpoints.remote_copy()?, body)
            }
        };

        let request = ApiRequest::api(Method::POST, url).json(&body)?;
        let response: CopyResponse = self.transport.execute_json(request).await?;
        response.into_copied()
    }

    // ==================== Collections ====================

    /// Query builder over the project's files
    pub fn files(&self) -> FilesQuery {
        FilesQuery::new(self.transport.clone(), self.endpoints.files())
    }

    /// Query builder over the project's groups
    pub fn groups(&self) -> GroupsQuery {
        GroupsQuery::new(self.transport.clone(), self.endpoints.groups())
    }

    /// Lazy sequence over any collection endpoint
    pub fn paginate<T: DeserializeOwned + 'static>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
        style: PageStyle,
    ) -> Result<Paginator<T>> {
        let base = self.endpoints.api_path(path)?;
        Ok(Paginator::new(self.transport.clone(), base, params, style))
    }

    // ==================== Uploads ====================

    /// Uploader using this client's settings
    pub fn uploader(&self) -> ChunkedUploader {
        ChunkedUploader::new(self.transport.clone(), self.endpoints.clone(), &self.config)
    }

    /// URL importer using this client's polling policy
    pub fn importer(&self) -> AsyncImporter {
        AsyncImporter::new(
            self.transport.clone(),
            self.endpoints.clone(),
            self.config.poll.clone(),
        )
    }

    /// Upload a file
    pub async fn upload(&self, source: UploadSource, options: &UploadOptions) -> Result<File> {
        self.uploader().upload(source, options).await
    }

    /// Import a file from a remote URL
    pub async fn import_from_url(&self, source_url: &str, options: &UploadOptions) -> Result<File> {
        self.importer().import(source_url, options).await
    }

    // ==================== Helpers ====================

    async fn get<T: DeserializeOwned>(&self, url: url::Url) -> Result<T> {
        self.transport
            .execute_json(ApiRequest::api(Method::GET, url))
            .await
    }

    /// Send ids in sequential chunks and merge the outcomes
    #[instrument(skip(self, file_ids), fields(count = file_ids.len()))]
    async fn batch<S: AsRef<str>>(&self, method: Method, file_ids: &[S]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for chunk in file_ids.chunks(MAX_BATCH_SIZE) {
            let ids: Vec<&str> = chunk.iter().map(|id| id.as_ref()).collect();
            let request =
                ApiRequest::api(method.clone(), self.endpoints.files_storage()?).json(&ids)?;
            let body = self.transport.execute(request).await?;
            debug!(batch = ids.len(), "batch applied");
            if !body.is_empty() {
                outcome.merge(serde_json::from_slice(&body)?);
            }
        }
        Ok(outcome)
    }
}

/// Secret-aware lookup of a freshly uploaded file.
///
/// With a secret key the REST API is used; upload-only credentials fall back
/// to the public upload info endpoint.
pub(crate) async fn fetch_uploaded_file(
    transport: &Transport,
    endpoints: &Endpoints,
    file_id: &str,
) -> Result<File> {
    let credentials = transport.credentials();
    let request = if credentials.has_secret() {
        ApiRequest::api(Method::GET, endpoints.file(file_id)?)
    } else {
        ApiRequest::upload(
            Method::GET,
            endpoints.uploaded_file(credentials.public_key(), file_id)?,
        )
    };
    transport.execute_json(request).await
}
