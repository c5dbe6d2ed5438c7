//! End-to-end tests of the service façade: login, upload, catalog, download.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::remote::{
    AssetStatistics, GatewayFactory, PersonSummary, RemoteGateway, ServerCredentials,
    UploadRequest, UploadStatus, UploadedAsset, UserInfo,
};
use bridge_traits::storage::{FileSystemAccess, SecureStore};
use bytes::Bytes;
use core_auth::AuthError;
use core_runtime::config::{CoreConfig, RetrySettings};
use core_runtime::events::{CoreEvent, TransferDirection, TransferEvent};
use core_service::{CoreError, CoreService};
use core_transfer::{DownloadConfiguration, RunStatus, TransferConfiguration, TransferError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const API_KEY: &str = "key-123";

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct MemorySecureStore {
    storage: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.storage.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.storage.lock().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.storage.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.storage.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.storage.lock().clear();
        Ok(())
    }
}

struct LocalFileSystem;

#[async_trait]
impl FileSystemAccess for LocalFileSystem {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(path.exists())
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        Ok(std::fs::create_dir_all(path)?)
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        Ok(Bytes::from(std::fs::read(path)?))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        Ok(std::fs::write(path, &data)?)
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        Ok(std::fs::remove_file(path)?)
    }
}

#[derive(Default)]
struct Library {
    next_id: u64,
    assets: HashMap<String, (String, Vec<u8>)>,
    albums: HashMap<String, String>,
    members: HashMap<String, Vec<String>>,
}

/// Minimal photo server; every gateway the factory hands out shares one
/// library.
#[derive(Clone)]
struct PhotoServer {
    library: Arc<Mutex<Library>>,
    api_key: String,
}

fn unsupported<T>() -> BridgeResult<T> {
    Err(BridgeError::NotAvailable("not used in service tests".to_string()))
}

#[async_trait]
impl RemoteGateway for PhotoServer {
    async fn upload(&self, request: &UploadRequest) -> BridgeResult<UploadedAsset> {
        let data = std::fs::read(&request.file_path)?;
        let name = request
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut library = self.library.lock();
        library.next_id += 1;
        let id = format!("asset-{}", library.next_id);
        library.assets.insert(id.clone(), (name, data));
        Ok(UploadedAsset {
            asset_id: id,
            status: UploadStatus::Created,
        })
    }

    async fn download_asset(&self, asset_id: &str) -> BridgeResult<Bytes> {
        self.library
            .lock()
            .assets
            .get(asset_id)
            .map(|(_, data)| Bytes::from(data.clone()))
            .ok_or_else(|| BridgeError::NotFound(asset_id.to_string()))
    }

    async fn get_original_filename(&self, asset_id: &str) -> BridgeResult<String> {
        self.library
            .lock()
            .assets
            .get(asset_id)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| BridgeError::NotFound(asset_id.to_string()))
    }

    async fn get_asset_tags(&self, _asset_id: &str) -> BridgeResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_asset_description(&self, _asset_id: &str) -> BridgeResult<Option<String>> {
        Ok(None)
    }

    async fn update_description(&self, _asset_id: &str, _text: &str) -> BridgeResult<()> {
        unsupported()
    }

    async fn list_albums(&self) -> BridgeResult<HashMap<String, String>> {
        Ok(self.library.lock().albums.clone())
    }

    async fn create_album(&self, name: &str) -> BridgeResult<String> {
        let mut library = self.library.lock();
        library.next_id += 1;
        let id = format!("album-{}", library.next_id);
        library.albums.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn add_assets_to_album(&self, album_id: &str, ids: &[String]) -> BridgeResult<()> {
        self.library
            .lock()
            .members
            .entry(album_id.to_string())
            .or_default()
            .extend(ids.iter().cloned());
        Ok(())
    }

    async fn list_album_assets(&self, album_id: &str) -> BridgeResult<Vec<String>> {
        Ok(self
            .library
            .lock()
            .members
            .get(album_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tags(&self) -> BridgeResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn create_tag(&self, _name: &str) -> BridgeResult<String> {
        unsupported()
    }

    async fn tag_assets(&self, _tag_id: &str, _ids: &[String]) -> BridgeResult<()> {
        unsupported()
    }

    async fn list_tag_assets(&self, _tag_id: &str) -> BridgeResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn current_user(&self) -> BridgeResult<UserInfo> {
        if self.api_key != API_KEY {
            return Err(BridgeError::Unauthorized("invalid API key".to_string()));
        }
        Ok(UserInfo {
            id: "u1".to_string(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
        })
    }

    async fn asset_statistics(&self) -> BridgeResult<AssetStatistics> {
        let total = self.library.lock().assets.len() as u64;
        Ok(AssetStatistics {
            total,
            images: total,
            videos: 0,
        })
    }

    async fn list_people(&self) -> BridgeResult<Vec<PersonSummary>> {
        Ok(Vec::new())
    }

    async fn list_person_assets(&self, _person_id: &str) -> BridgeResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_all_assets(&self) -> BridgeResult<Vec<String>> {
        let mut ids: Vec<String> = self.library.lock().assets.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn smart_search(&self, _query: &str, _limit: usize) -> BridgeResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct PhotoServerFactory {
    library: Arc<Mutex<Library>>,
}

impl GatewayFactory for PhotoServerFactory {
    fn connect(&self, credentials: &ServerCredentials) -> BridgeResult<Arc<dyn RemoteGateway>> {
        Ok(Arc::new(PhotoServer {
            library: Arc::clone(&self.library),
            api_key: credentials.api_key.clone(),
        }))
    }
}

fn service() -> CoreService {
    let config = CoreConfig::builder()
        .secure_store(Arc::new(MemorySecureStore::default()))
        .file_system(Arc::new(LocalFileSystem))
        .retry(RetrySettings::default().with_delay(Duration::ZERO))
        .build()
        .unwrap();
    CoreService::new(config, Arc::new(PhotoServerFactory::default())).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[core_async::test]
async fn test_runs_require_a_session() {
    let core = service();
    let dir = TempDir::new().unwrap();

    let err = core
        .start_upload(vec![dir.path().to_path_buf()], TransferConfiguration::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::Auth(AuthError::NotAuthenticated)));
    assert!(err.requires_login());

    assert!(core.refresh_catalog().await.is_err());
    assert!(core.library_pack().await.is_err());
}

#[core_async::test]
async fn test_upload_then_download_round_trip() {
    let core = service();
    let session = core.login("https://photos.example.com/", API_KEY).await.unwrap();
    assert_eq!(session.base_url, "https://photos.example.com");

    let source = TempDir::new().unwrap();
    let trip = source.path().join("Trip");
    std::fs::create_dir_all(&trip).unwrap();
    std::fs::write(trip.join("a.jpg"), "aaa").unwrap();
    std::fs::write(trip.join("b.jpg"), "bbb").unwrap();

    let mut transfers = core.subscribe_transfers();
    let upload = core
        .start_upload(
            vec![trip.clone()],
            TransferConfiguration::default().with_directories_as_albums(true),
        )
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(upload.status, RunStatus::Completed);
    assert_eq!(upload.succeeded(), 2);

    let mut completed = false;
    while let Some(Ok(event)) = transfers.try_recv() {
        assert!(matches!(event, CoreEvent::Transfer(_)));
        if let CoreEvent::Transfer(TransferEvent::Completed {
            direction, succeeded, ..
        }) = event
        {
            assert_eq!(direction, TransferDirection::Upload);
            assert_eq!(succeeded, 2);
            completed = true;
        }
    }
    assert!(completed);

    let summary = core.account_summary().await.unwrap();
    assert_eq!(summary.statistics.total, 2);

    let catalog = core.refresh_catalog().await.unwrap().wait().await.unwrap();
    assert_eq!(catalog.albums.len(), 1);
    assert_eq!(catalog.albums[0].name, "Trip");
    assert_eq!(core.catalog(), Some(catalog.clone()));

    core.queue_pack(catalog.albums[0].clone());
    assert_eq!(core.download_queue().total_assets(), 2);

    let target = TempDir::new().unwrap();
    let download = core
        .start_download(DownloadConfiguration::default().with_save_path(target.path()))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(download.succeeded(), 2);
    assert_eq!(
        std::fs::read_to_string(target.path().join("Trip").join("b.jpg")).unwrap(),
        "bbb"
    );

    core.logout().await.unwrap();
    assert!(core.current_session().await.is_none());
    assert!(core.download_queue().is_empty());
}

#[core_async::test]
async fn test_download_without_save_path_is_rejected() {
    let core = service();
    core.login("https://photos.example.com", API_KEY).await.unwrap();
    core.queue_pack(core.library_pack().await.unwrap());

    let err = core
        .start_download(DownloadConfiguration::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::Transfer(TransferError::Configuration(_))));
}

#[core_async::test]
async fn test_rejected_login() {
    let core = service();
    let err = core
        .login("https://photos.example.com", "wrong")
        .await
        .err()
        .unwrap();
    assert!(err.requires_login());
    assert!(core.restore_session().await.unwrap().is_none());
}
