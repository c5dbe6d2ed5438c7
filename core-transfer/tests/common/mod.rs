//! Shared fakes for the transfer integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::remote::{
    AssetStatistics, PersonSummary, RemoteGateway, UploadRequest, UploadStatus, UploadedAsset,
    UserInfo,
};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::config::RetrySettings;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Recorded calls
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upload(String),
    ListAlbums,
    CreateAlbum(String),
    AddToAlbum { album: String, assets: Vec<String> },
    ListTags,
    CreateTag(String),
    TagAssets { tag: String, assets: Vec<String> },
    UpdateDescription { asset: String, text: String },
    Download(String),
    Other(&'static str),
}

impl Call {
    pub fn is_organization(&self) -> bool {
        matches!(
            self,
            Call::ListAlbums
                | Call::CreateAlbum(_)
                | Call::AddToAlbum { .. }
                | Call::ListTags
                | Call::CreateTag(_)
                | Call::TagAssets { .. }
                | Call::UpdateDescription { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteAsset {
    pub file_name: String,
    pub data: Vec<u8>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

type UploadHook = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    next_id: u64,
    albums: HashMap<String, String>,
    tags: HashMap<String, String>,
    album_members: HashMap<String, Vec<String>>,
    tag_members: HashMap<String, Vec<String>>,
    people: Vec<PersonSummary>,
    person_members: HashMap<String, Vec<String>>,
    assets: HashMap<String, RemoteAsset>,
    by_device_id: HashMap<String, String>,
    /// File name -> remaining failing attempts.
    upload_failures: HashMap<String, u32>,
    /// `"operation"` or `"operation:subject"` keys that fail.
    failing: HashSet<String>,
    panic_on_upload: bool,
    uploads_succeeded: u64,
}

/// In-memory photo server that records every call.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<State>>,
    on_upload: Arc<Mutex<Option<UploadHook>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn RemoteGateway> {
        Arc::new(self.clone())
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// The next `attempts` uploads of `file_name` fail transiently.
    pub fn fail_upload(&self, file_name: &str, attempts: u32) {
        self.state
            .lock()
            .upload_failures
            .insert(file_name.to_string(), attempts);
    }

    /// Makes `operation` (optionally for one subject) fail permanently.
    pub fn fail_on(&self, key: &str) {
        self.state.lock().failing.insert(key.to_string());
    }

    pub fn panic_on_upload(&self) {
        self.state.lock().panic_on_upload = true;
    }

    /// Called with the running count of accepted uploads.
    pub fn on_upload(&self, hook: impl Fn(u64) + Send + Sync + 'static) {
        *self.on_upload.lock() = Some(Arc::new(hook));
    }

    pub fn with_album(&self, name: &str, assets: &[&str]) -> String {
        let mut state = self.state.lock();
        let id = next_id(&mut state, "album");
        state.albums.insert(name.to_string(), id.clone());
        state
            .album_members
            .insert(id.clone(), assets.iter().map(|a| a.to_string()).collect());
        id
    }

    pub fn with_tag(&self, name: &str, assets: &[&str]) -> String {
        let mut state = self.state.lock();
        let id = next_id(&mut state, "tag");
        state.tags.insert(name.to_string(), id.clone());
        state
            .tag_members
            .insert(id.clone(), assets.iter().map(|a| a.to_string()).collect());
        id
    }

    pub fn with_person(&self, name: &str, assets: &[&str]) -> String {
        let mut state = self.state.lock();
        let id = next_id(&mut state, "person");
        state.people.push(PersonSummary {
            id: id.clone(),
            name: name.to_string(),
        });
        state
            .person_members
            .insert(id.clone(), assets.iter().map(|a| a.to_string()).collect());
        id
    }

    pub fn with_asset(&self, id: &str, asset: RemoteAsset) {
        self.state.lock().assets.insert(id.to_string(), asset);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn uploads_of(&self, file_name: &str) -> usize {
        self.count(|c| *c == Call::Upload(file_name.to_string()))
    }

    pub fn album_id(&self, name: &str) -> Option<String> {
        self.state.lock().albums.get(name).cloned()
    }

    pub fn tag_id(&self, name: &str) -> Option<String> {
        self.state.lock().tags.get(name).cloned()
    }

    pub fn album_members(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .albums
            .get(name)
            .and_then(|id| state.album_members.get(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn tag_members(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .tags
            .get(name)
            .and_then(|id| state.tag_members.get(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn description(&self, asset_id: &str) -> Option<String> {
        self.state
            .lock()
            .assets
            .get(asset_id)
            .and_then(|a| a.description.clone())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn check(&self, operation: &str, subject: &str) -> Result<()> {
        let state = self.state.lock();
        if state.failing.contains(operation)
            || state.failing.contains(&format!("{}:{}", operation, subject))
        {
            return Err(BridgeError::OperationFailed(format!(
                "{} failed for {}",
                operation, subject
            )));
        }
        Ok(())
    }
}

fn next_id(state: &mut State, prefix: &str) -> String {
    state.next_id += 1;
    format!("{}-{}", prefix, state.next_id)
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedAsset> {
        let file_name = request
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(Call::Upload(file_name.clone()));

        let (uploaded, count) = {
            let mut state = self.state.lock();
            if state.panic_on_upload {
                drop(state);
                panic!("gateway exploded");
            }

            if let Some(remaining) = state.upload_failures.get_mut(&file_name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BridgeError::OperationFailed("503 Service Unavailable".to_string()));
                }
            }

            let uploaded = match state.by_device_id.get(&request.device_asset_id) {
                Some(id) => UploadedAsset {
                    asset_id: id.clone(),
                    status: UploadStatus::Duplicate,
                },
                None => {
                    let id = next_id(&mut state, "asset");
                    state
                        .by_device_id
                        .insert(request.device_asset_id.clone(), id.clone());
                    state.assets.insert(
                        id.clone(),
                        RemoteAsset {
                            file_name: file_name.clone(),
                            ..RemoteAsset::default()
                        },
                    );
                    UploadedAsset {
                        asset_id: id,
                        status: UploadStatus::Created,
                    }
                }
            };
            state.uploads_succeeded += 1;
            (uploaded, state.uploads_succeeded)
        };

        let hook = self.on_upload.lock().clone();
        if let Some(hook) = hook {
            hook(count);
        }
        Ok(uploaded)
    }

    async fn download_asset(&self, asset_id: &str) -> Result<Bytes> {
        self.record(Call::Download(asset_id.to_string()));
        self.check("download_asset", asset_id)?;
        self.state
            .lock()
            .assets
            .get(asset_id)
            .map(|a| Bytes::from(a.data.clone()))
            .ok_or_else(|| BridgeError::NotFound(asset_id.to_string()))
    }

    async fn get_original_filename(&self, asset_id: &str) -> Result<String> {
        self.record(Call::Other("get_original_filename"));
        self.check("get_original_filename", asset_id)?;
        self.state
            .lock()
            .assets
            .get(asset_id)
            .map(|a| a.file_name.clone())
            .ok_or_else(|| BridgeError::NotFound(asset_id.to_string()))
    }

    async fn get_asset_tags(&self, asset_id: &str) -> Result<Vec<String>> {
        self.record(Call::Other("get_asset_tags"));
        Ok(self
            .state
            .lock()
            .assets
            .get(asset_id)
            .map(|a| a.tags.clone())
            .unwrap_or_default())
    }

    async fn get_asset_description(&self, asset_id: &str) -> Result<Option<String>> {
        self.record(Call::Other("get_asset_description"));
        Ok(self.description(asset_id))
    }

    async fn update_description(&self, asset_id: &str, text: &str) -> Result<()> {
        self.record(Call::UpdateDescription {
            asset: asset_id.to_string(),
            text: text.to_string(),
        });
        self.check("update_description", asset_id)?;
        self.state
            .lock()
            .assets
            .entry(asset_id.to_string())
            .or_default()
            .description = Some(text.to_string());
        Ok(())
    }

    async fn list_albums(&self) -> Result<HashMap<String, String>> {
        self.record(Call::ListAlbums);
        self.check("list_albums", "")?;
        Ok(self.state.lock().albums.clone())
    }

    async fn create_album(&self, name: &str) -> Result<String> {
        self.record(Call::CreateAlbum(name.to_string()));
        self.check("create_album", name)?;
        let mut state = self.state.lock();
        let id = next_id(&mut state, "album");
        state.albums.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn add_assets_to_album(&self, album_id: &str, asset_ids: &[String]) -> Result<()> {
        self.record(Call::AddToAlbum {
            album: album_id.to_string(),
            assets: asset_ids.to_vec(),
        });
        self.check("add_assets_to_album", album_id)?;
        self.state
            .lock()
            .album_members
            .entry(album_id.to_string())
            .or_default()
            .extend(asset_ids.iter().cloned());
        Ok(())
    }

    async fn list_album_assets(&self, album_id: &str) -> Result<Vec<String>> {
        self.record(Call::Other("list_album_assets"));
        self.check("list_album_assets", album_id)?;
        Ok(self
            .state
            .lock()
            .album_members
            .get(album_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tags(&self) -> Result<HashMap<String, String>> {
        self.record(Call::ListTags);
        self.check("list_tags", "")?;
        Ok(self.state.lock().tags.clone())
    }

    async fn create_tag(&self, name: &str) -> Result<String> {
        self.record(Call::CreateTag(name.to_string()));
        self.check("create_tag", name)?;
        let mut state = self.state.lock();
        let id = next_id(&mut state, "tag");
        state.tags.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn tag_assets(&self, tag_id: &str, asset_ids: &[String]) -> Result<()> {
        self.record(Call::TagAssets {
            tag: tag_id.to_string(),
            assets: asset_ids.to_vec(),
        });
        self.check("tag_assets", tag_id)?;
        self.state
            .lock()
            .tag_members
            .entry(tag_id.to_string())
            .or_default()
            .extend(asset_ids.iter().cloned());
        Ok(())
    }

    async fn list_tag_assets(&self, tag_id: &str) -> Result<Vec<String>> {
        self.record(Call::Other("list_tag_assets"));
        self.check("list_tag_assets", tag_id)?;
        Ok(self
            .state
            .lock()
            .tag_members
            .get(tag_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn current_user(&self) -> Result<UserInfo> {
        Ok(UserInfo {
            id: "user-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        })
    }

    async fn asset_statistics(&self) -> Result<AssetStatistics> {
        let total = self.state.lock().assets.len() as u64;
        Ok(AssetStatistics {
            total,
            images: total,
            videos: 0,
        })
    }

    async fn list_people(&self) -> Result<Vec<PersonSummary>> {
        self.record(Call::Other("list_people"));
        self.check("list_people", "")?;
        Ok(self.state.lock().people.clone())
    }

    async fn list_person_assets(&self, person_id: &str) -> Result<Vec<String>> {
        self.record(Call::Other("list_person_assets"));
        self.check("list_person_assets", person_id)?;
        Ok(self
            .state
            .lock()
            .person_members
            .get(person_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_all_assets(&self) -> Result<Vec<String>> {
        self.record(Call::Other("list_all_assets"));
        self.check("list_all_assets", "")?;
        let mut ids: Vec<String> = self.state.lock().assets.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn smart_search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        self.record(Call::Other("smart_search"));
        self.check("smart_search", query)?;
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .assets
            .iter()
            .filter(|(_, a)| a.file_name.contains(query))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids.truncate(limit);
        Ok(ids)
    }
}

// ============================================================================
// Local filesystem
// ============================================================================

/// `FileSystemAccess` over `std::fs`, with optional write failures.
#[derive(Default)]
pub struct LocalFileSystem {
    failing_writes: Mutex<HashSet<PathBuf>>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_write(&self, path: impl Into<PathBuf>) {
        self.failing_writes.lock().insert(path.into());
    }
}

#[async_trait]
impl FileSystemAccess for LocalFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(std::fs::create_dir_all(path)?)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        Ok(Bytes::from(std::fs::read(path)?))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if self.failing_writes.lock().contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "disk full: {}",
                path.display()
            )));
        }
        Ok(std::fs::write(path, &data)?)
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        Ok(std::fs::remove_file(path)?)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn fast_retry() -> RetrySettings {
    RetrySettings::default().with_delay(Duration::ZERO)
}

pub fn media_extensions() -> Vec<String> {
    core_runtime::config::DEFAULT_MEDIA_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Writes `files` (relative paths) under `root` with small distinct contents.
pub fn write_files(root: &Path, files: &[&str]) {
    for (index, file) in files.iter().enumerate() {
        let path = root.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, format!("content-{}", index)).unwrap();
    }
}
