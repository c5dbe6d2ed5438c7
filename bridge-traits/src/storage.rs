//! Storage Abstractions
//!
//! Local file writes for downloaded assets and secure persistence of the
//! server login.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File system access trait
///
/// Download runs write every asset and caption sidecar through this trait,
/// so hosts with sandboxed storage can redirect writes and tests can observe
/// them.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save(fs: &dyn FileSystemAccess, dir: &Path, data: Bytes) -> Result<()> {
///     fs.create_dir_all(dir).await?;
///     fs.write_file(&dir.join("IMG_0001.jpg"), data).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Creates `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it (and its parent) if needed.
    /// Existing contents are replaced.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;
}

/// Platform keychain holding the persisted login.
///
/// The desktop implementation maps keys onto keyring entries (Keychain,
/// Credential Manager, Secret Service). Values are never logged.
///
/// ```ignore
/// async fn remember(store: &dyn SecureStore, base_url: &str, api_key: &str) -> Result<()> {
///     store.set_secret("base_url", base_url.as_bytes()).await?;
///     store.set_secret("token", api_key.as_bytes()).await
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Inserts or replaces `key`.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// `Ok(None)` when `key` was never stored or has been deleted.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing key succeeds.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// Keys written by this store, without their values.
    async fn list_keys(&self) -> Result<Vec<String>>;

    async fn clear_all(&self) -> Result<()>;
}
