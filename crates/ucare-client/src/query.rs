//! Collection query builders

use crate::pagination::{PageStyle, Paginator};
use crate::transport::Transport;
use crate::types::{File, Group};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use ucare_auth::iso8601;
use url::Url;

/// Sort order of a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ordering {
    UploadTimeAsc,
    UploadTimeDesc,
    SizeAsc,
    SizeDesc,
}

impl Ordering {
    /// Value of the `ordering` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadTimeAsc => "datetime_uploaded",
            Self::UploadTimeDesc => "-datetime_uploaded",
            Self::SizeAsc => "size",
            Self::SizeDesc => "-size",
        }
    }
}

/// Filters shared by the builders; kept sorted so requests are reproducible
#[derive(Clone, Debug, Default)]
struct Params(BTreeMap<&'static str, String>);

impl Params {
    fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    fn remove(&mut self, key: &'static str) {
        self.0.remove(key);
    }

    fn to_vec(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Query over the project's files.
///
/// ```rust,ignore
/// let files = client.files().stored(true).limit(100).collect().await?;
/// ```
#[derive(Clone, Debug)]
pub struct FilesQuery {
    transport: Transport,
    base: Url,
    params: Params,
    style: PageStyle,
}

impl FilesQuery {
    pub(crate) fn new(transport: Transport, base: Url) -> Self {
        Self {
            transport,
            base,
            params: Params::default(),
            style: PageStyle::Cursor,
        }
    }

    /// Only removed (`true`) or only live (`false`) files
    pub fn removed(mut self, removed: bool) -> Self {
        self.params.set("removed", removed.to_string());
        self
    }

    /// Only stored (`true`) or only unstored (`false`) files
    pub fn stored(mut self, stored: bool) -> Self {
        self.params.set("stored", stored.to_string());
        self
    }

    /// Page size
    pub fn limit(mut self, limit: u32) -> Self {
        self.params.set("limit", limit.to_string());
        self
    }

    /// Sort order; clears any `from` bound
    pub fn ordering(mut self, ordering: Ordering) -> Self {
        self.params.set("ordering", ordering.as_str());
        self.params.remove("from");
        self
    }

    /// Files uploaded at or after `date`, oldest first
    pub fn from_date(self, date: DateTime<Utc>) -> Self {
        self.bounded(Ordering::UploadTimeAsc, iso8601(date))
    }

    /// Files uploaded at or before `date`, newest first
    pub fn to_date(self, date: DateTime<Utc>) -> Self {
        self.bounded(Ordering::UploadTimeDesc, iso8601(date))
    }

    /// Files of at least `size` bytes, smallest first
    pub fn from_size(self, size: u64) -> Self {
        self.bounded(Ordering::SizeAsc, size.to_string())
    }

    /// Files of at most `size` bytes, largest first
    pub fn to_size(self, size: u64) -> Self {
        self.bounded(Ordering::SizeDesc, size.to_string())
    }

    /// Extra fields to include, e.g. `rekognition_info`
    pub fn add_fields(mut self, fields: impl Into<String>) -> Self {
        self.params.set("add_fields", fields);
        self
    }

    /// Override the continuation style
    pub fn page_style(mut self, style: PageStyle) -> Self {
        self.style = style;
        self
    }

    /// Query parameters that will be sent
    pub fn params(&self) -> Vec<(String, String)> {
        self.params.to_vec()
    }

    /// Lazy sequence of matching files
    pub fn paginate(self) -> Paginator<File> {
        Paginator::new(self.transport, self.base, self.params.to_vec(), self.style)
    }

    /// Every matching file
    pub async fn collect(self) -> Result<Vec<File>> {
        self.paginate().collect_all().await
    }

    fn bounded(mut self, ordering: Ordering, from: String) -> Self {
        self.params.set("ordering", ordering.as_str());
        self.params.set("from", from);
        self
    }
}

/// Query over the project's groups
#[derive(Clone, Debug)]
pub struct GroupsQuery {
    transport: Transport,
    base: Url,
    params: Params,
}

impl GroupsQuery {
    pub(crate) fn new(transport: Transport, base: Url) -> Self {
        Self {
            transport,
            base,
            params: Params::default(),
        }
    }

    /// Sort by creation time
    pub fn newest_first(mut self, newest_first: bool) -> Self {
        let ordering = if newest_first {
            "-datetime_created"
        } else {
            "datetime_created"
        };
        self.params.set("ordering", ordering);
        self
    }

    /// Groups created at or after `date`
    pub fn from_date(mut self, date: DateTime<Utc>) -> Self {
        self.params.set("from", iso8601(date));
        self
    }

    /// Page size
    pub fn limit(mut self, limit: u32) -> Self {
        self.params.set("limit", limit.to_string());
        self
    }

    /// Query parameters that will be sent
    pub fn params(&self) -> Vec<(String, String)> {
        self.params.to_vec()
    }

    /// Lazy sequence of matching groups
    pub fn paginate(self) -> Paginator<Group> {
        Paginator::new(self.transport, self.base, self.params.to_vec(), PageStyle::Cursor)
    }

    /// Every matching group
    pub async fn collect(self) -> Result<Vec<Group>> {
        self.paginate().collect_all().await
    }
}
