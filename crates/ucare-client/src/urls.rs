//! REST and upload API endpoints

use crate::{Config, Result};
use url::Url;

/// Resolved endpoint URLs for one client.
///
/// Hosts come from [`Config`] and stay fixed for the lifetime of the client.
#[derive(Clone, Debug)]
pub struct Endpoints {
    api: Url,
    upload: Url,
    files: Url,
    groups: Url,
}

impl Endpoints {
    /// Parse the configured hosts
    pub fn new(config: &Config) -> Result<Self> {
        let api = Url::parse(&config.api_base)?;
        Ok(Self {
            files: api.join("/files/")?,
            groups: api.join("/groups/")?,
            upload: Url::parse(&config.upload_base)?,
            api,
        })
    }

    /// `GET /project/`
    pub fn project(&self) -> Result<Url> {
        self.api_path("/project/")
    }

    /// `GET /files/`
    pub fn files(&self) -> Url {
        self.files.clone()
    }

    /// `GET|DELETE /files/{id}/`
    pub fn file(&self, file_id: &str) -> Result<Url> {
        self.api_path(&format!("/files/{}/", file_id))
    }

    /// `PUT /files/{id}/storage/`
    pub fn file_storage(&self, file_id: &str) -> Result<Url> {
        self.api_path(&format!("/files/{}/storage/", file_id))
    }

    /// `PUT|DELETE /files/storage/`
    pub fn files_storage(&self) -> Result<Url> {
        self.api_path("/files/storage/")
    }

    /// `GET /groups/`
    pub fn groups(&self) -> Url {
        self.groups.clone()
    }

    /// `GET /groups/{id}/`
    pub fn group(&self, group_id: &str) -> Result<Url> {
        self.api_path(&format!("/groups/{}/", group_id))
    }

    /// `PUT /groups/{id}/storage/`
    pub fn group_storage(&self, group_id: &str) -> Result<Url> {
        self.api_path(&format!("/groups/{}/storage/", group_id))
    }

    /// `POST /files/local_copy/`
    pub fn local_copy(&self) -> Result<Url> {
        self.api_path("/files/local_copy/")
    }

    /// `POST /files/remote_copy/`
    pub fn remote_copy(&self) -> Result<Url> {
        self.api_path("/files/remote_copy/")
    }

    /// Arbitrary REST path, e.g. a collection endpoint
    pub fn api_path(&self, path: &str) -> Result<Url> {
        Ok(self.api.join(path)?)
    }

    /// `POST /base/`
    pub fn upload_direct(&self) -> Result<Url> {
        self.upload_path("/base/")
    }

    /// `POST /multipart/start/`
    pub fn multipart_start(&self) -> Result<Url> {
        self.upload_path("/multipart/start/")
    }

    /// `POST /multipart/complete/`
    pub fn multipart_complete(&self) -> Result<Url> {
        self.upload_path("/multipart/complete/")
    }

    /// `POST /from_url/`
    pub fn from_url(&self) -> Result<Url> {
        self.upload_path("/from_url/")
    }

    /// `GET /from_url/status/?token=`
    pub fn from_url_status(&self, token: &str) -> Result<Url> {
        let mut url = self.upload_path("/from_url/status/")?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    /// `GET /info/?pub_key=&file_id=`
    pub fn uploaded_file(&self, public_key: &str, file_id: &str) -> Result<Url> {
        let mut url = self.upload_path("/info/")?;
        url.query_pairs_mut()
            .append_pair("pub_key", public_key)
            .append_pair("file_id", file_id);
        Ok(url)
    }

    /// `POST /group/`
    pub fn create_group(&self) -> Result<Url> {
        self.upload_path("/group/")
    }

    /// `GET /group/info/?pub_key=&group_id=`
    pub fn uploaded_group(&self, public_key: &str, group_id: &str) -> Result<Url> {
        let mut url = self.upload_path("/group/info/")?;
        url.query_pairs_mut()
            .append_pair("pub_key", public_key)
            .append_pair("group_id", group_id);
        Ok(url)
    }

    fn upload_path(&self, path: &str) -> Result<Url> {
        Ok(self.upload.join(path)?)
    }
}

/// Path plus raw query, the form that goes into the canonical string
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
