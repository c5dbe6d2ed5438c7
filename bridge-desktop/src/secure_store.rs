//! Secure Credential Storage using OS Keychain

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use core_async::task;
use keyring::Entry;
use tracing::debug;

/// Keychain service the desktop client has always stored its login under.
pub const DEFAULT_SERVICE_NAME: &str = "ImmichClient";

/// Keyring-based secure storage implementation
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// Values are stored as plain UTF-8 passwords so entries written by earlier
/// releases (`base_url`, `token`) stay readable. The keychain cannot
/// enumerate a service, so `list_keys`/`clear_all` operate on the keys this
/// store was told about.
pub struct KeyringSecureStore {
    service_name: String,
    known_keys: Vec<String>,
}

impl KeyringSecureStore {
    /// Create a store under [`DEFAULT_SERVICE_NAME`] tracking the login keys.
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE_NAME)
    }

    /// Create a new secure store with custom service name
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            known_keys: vec!["base_url".to_string(), "token".to_string()],
        }
    }

    /// Replace the set of keys reported by `list_keys` and removed by `clear_all`.
    pub fn with_known_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }

    /// Runs a blocking keychain call off the async worker.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> std::result::Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service_name.clone();
        let key = key.to_string();

        task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            op(entry)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Keyring task failed: {}", e)))?
        .map_err(Self::map_keyring_error)
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(value)
            .map_err(|e| BridgeError::OperationFailed(format!("Secret is not UTF-8: {}", e)))?
            .to_string();

        self.with_entry(key, move |entry| entry.set_password(&text))
            .await?;

        debug!(key = key, service = %self.service_name, "Stored secret in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let found = self
            .with_entry(key, |entry| match entry.get_password() {
                Ok(password) => Ok(Some(password.into_bytes())),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        debug!(key = key, found = found.is_some(), "Looked up secret in keyring");
        Ok(found)
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await?;

        debug!(key = key, "Deleted secret from keyring");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut present = Vec::new();
        for key in &self.known_keys {
            if self.has_secret(key).await? {
                present.push(key.clone());
            }
        }
        Ok(present)
    }

    async fn clear_all(&self) -> Result<()> {
        for key in &self.known_keys {
            self.delete_secret(key).await?;
        }
        Ok(())
    }
}
