//! Remote Photo Server Abstractions
//!
//! The transfer engine never speaks HTTP itself. Everything it needs from the
//! server (asset upload/download, album and tag collections, descriptions,
//! account and catalog queries) goes through [`RemoteGateway`], which a host
//! builds from a [`ServerCredentials`] via [`GatewayFactory`].
//!
//! Every call returns a [`Result`](crate::error::Result); no failure crosses
//! the orchestration boundary as a panic.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Server address plus API key for one login.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCredentials {
    pub base_url: String,
    pub api_key: String,
}

impl ServerCredentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Everything the server needs to accept one local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Absolute path of the file to stream.
    pub file_path: PathBuf,
    /// Stable identifier the server deduplicates on.
    pub device_asset_id: String,
    pub device_id: String,
    pub file_created_at: DateTime<Utc>,
    pub file_modified_at: DateTime<Utc>,
}

/// Server classification of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    Created,
    /// The server already holds an asset with the same identity.
    Duplicate,
    Other(String),
}

impl UploadStatus {
    /// Maps the server's status string.
    pub fn from_server(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "duplicate" => Self::Duplicate,
            _ => Self::Other(status.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::Other(status) => status,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub asset_id: String,
    pub status: UploadStatus,
}

/// Account the credentials belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Library totals shown after login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub total: u64,
    pub images: u64,
    pub videos: u64,
}

/// A recognised person in the server's face index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: String,
    pub name: String,
}

/// Capability surface of the remote photo server.
///
/// Collection listings return `name -> id` maps; the engine snapshots them
/// once per run and never re-lists per asset.
///
/// Implementations perform a single attempt per call. Retrying is the
/// caller's policy.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    /// Upload one file.
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedAsset>;

    /// Download the original bytes of an asset.
    async fn download_asset(&self, asset_id: &str) -> Result<Bytes>;

    /// File name the asset was uploaded with.
    async fn get_original_filename(&self, asset_id: &str) -> Result<String>;

    /// Names of the tags attached to an asset.
    async fn get_asset_tags(&self, asset_id: &str) -> Result<Vec<String>>;

    /// Description text, `None` when empty.
    async fn get_asset_description(&self, asset_id: &str) -> Result<Option<String>>;

    async fn update_description(&self, asset_id: &str, text: &str) -> Result<()>;

    // ------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------

    async fn list_albums(&self) -> Result<HashMap<String, String>>;

    /// Creates an empty album and returns its id.
    async fn create_album(&self, name: &str) -> Result<String>;

    async fn add_assets_to_album(&self, album_id: &str, asset_ids: &[String]) -> Result<()>;

    async fn list_album_assets(&self, album_id: &str) -> Result<Vec<String>>;

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    async fn list_tags(&self) -> Result<HashMap<String, String>>;

    /// Creates a tag and returns its id.
    async fn create_tag(&self, name: &str) -> Result<String>;

    async fn tag_assets(&self, tag_id: &str, asset_ids: &[String]) -> Result<()>;

    async fn list_tag_assets(&self, tag_id: &str) -> Result<Vec<String>>;

    // ------------------------------------------------------------------
    // Account and catalog
    // ------------------------------------------------------------------

    /// Validates the credentials by fetching the owning account.
    async fn current_user(&self) -> Result<UserInfo>;

    async fn asset_statistics(&self) -> Result<AssetStatistics>;

    async fn list_people(&self) -> Result<Vec<PersonSummary>>;

    async fn list_person_assets(&self, person_id: &str) -> Result<Vec<String>>;

    /// Every asset id in the library.
    async fn list_all_assets(&self) -> Result<Vec<String>>;

    /// CLIP search; returns at most `limit` asset ids, best match first.
    async fn smart_search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Builds a gateway bound to one login.
///
/// Construction must not perform I/O; validation is done by calling
/// [`RemoteGateway::current_user`] on the result.
pub trait GatewayFactory: Send + Sync {
    fn connect(&self, credentials: &ServerCredentials) -> Result<Arc<dyn RemoteGateway>>;
}
