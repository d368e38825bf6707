//! Resource types returned by the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stored or uploaded file.
///
/// Media details are attached by composition: images carry `image_info`,
/// videos carry `video_info`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    /// File UUID
    pub uuid: String,
    /// API resource URL
    pub url: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Whether the file is ready to be served
    pub is_ready: bool,
    /// Whether the file is an image
    pub is_image: bool,
    /// Detected MIME type
    pub mime_type: Option<String>,
    /// Filename at upload time
    pub original_filename: Option<String>,
    /// CDN URL of the original file
    pub original_file_url: Option<String>,
    /// Upload time
    pub datetime_uploaded: Option<DateTime<Utc>>,
    /// Time the file was stored, if it was
    pub datetime_stored: Option<DateTime<Utc>>,
    /// Time the file was removed, if it was
    pub datetime_removed: Option<DateTime<Utc>>,
    /// Image details
    pub image_info: Option<ImageInfo>,
    /// Video details
    pub video_info: Option<VideoInfo>,
    /// Generated variations (e.g. video conversions)
    pub variations: Option<HashMap<String, String>>,
}

impl File {
    /// Whether the file has been stored
    pub fn is_stored(&self) -> bool {
        self.datetime_stored.is_some()
    }

    /// Whether the file has been removed
    pub fn is_removed(&self) -> bool {
        self.datetime_removed.is_some()
    }
}

/// Image metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
    pub orientation: Option<u32>,
    pub dpi: Option<Vec<u32>>,
    pub datetime_original: Option<String>,
    pub geo_location: Option<GeoLocation>,
}

/// Where an image was taken
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Video metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    /// Duration in milliseconds
    pub duration: Option<u64>,
    pub format: Option<String>,
    pub bitrate: Option<u64>,
}

/// A group of files
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    /// Group id, `<uuid>~<count>`
    pub id: String,
    pub url: Option<String>,
    pub datetime_created: Option<DateTime<Utc>>,
    pub datetime_stored: Option<DateTime<Utc>>,
    pub files_count: u32,
    pub cdn_url: Option<String>,
    /// Member files in group order; entries for deleted files are `None`
    pub files: Vec<Option<File>>,
}

/// Project information
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub pub_key: String,
    pub collaborators: Vec<Collaborator>,
}

/// Project collaborator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Collaborator {
    pub name: String,
    pub email: String,
}

/// Whether an upload is kept beyond the transient retention window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorePolicy {
    /// Follow the project setting
    #[default]
    Auto,
    /// Store on upload
    Store,
    /// Keep only for the retention window
    DoNotStore,
}

impl StorePolicy {
    /// Value of the `store` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Store => "1",
            Self::DoNotStore => "0",
        }
    }
}

impl From<bool> for StorePolicy {
    fn from(store: bool) -> Self {
        if store {
            Self::Store
        } else {
            Self::DoNotStore
        }
    }
}

/// Where a copy of a file goes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyTarget {
    /// Project storage; a new file is created
    Local { store: bool, make_public: bool },
    /// A custom storage attached to the project
    Remote {
        /// Storage name from the project settings
        target: String,
        make_public: bool,
        /// Naming pattern, e.g. `${uuid}/${filename}${effects}${ext}`; storage default when `None`
        pattern: Option<String>,
    },
}

/// Outcome of a copy
#[derive(Clone, Debug)]
pub enum CopiedFile {
    /// Local copy, as a new file
    File(File),
    /// Remote copy, as a URL in the custom storage
    Url(String),
}

/// Signature and expiry of a signed upload, crafted server-side
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSignature {
    pub signature: String,
    /// Unix time until which the signature is valid
    pub expire: String,
}

impl UploadSignature {
    pub fn new(signature: impl Into<String>, expire: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            expire: expire.into(),
        }
    }

    /// Both parts present and non-empty
    pub fn is_complete(&self) -> bool {
        !self.signature.is_empty() && !self.expire.is_empty()
    }
}
