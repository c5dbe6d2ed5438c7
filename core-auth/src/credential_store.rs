//! Persisted Server Credentials
//!
//! Stores the server URL and API key of the last successful login in the
//! platform secure store so the next launch can sign in silently.
//!
//! Two entries are written under fixed keys, [`BASE_URL_KEY`] and
//! [`TOKEN_KEY`], each holding plain UTF-8. Credentials are only considered
//! present when both entries exist.
//!
//! ## Example
//!
//! ```no_run
//! use bridge_traits::remote::ServerCredentials;
//! use core_auth::CredentialStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::new(secure_store);
//!
//! store
//!     .save(&ServerCredentials::new("https://photos.example.com", "api-key"))
//!     .await?;
//!
//! if let Some(credentials) = store.load().await? {
//!     println!("Saved login for {}", credentials.base_url);
//! }
//!
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::remote::ServerCredentials;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secure-store key holding the normalized server URL.
pub const BASE_URL_KEY: &str = "base_url";

/// Secure-store key holding the API key.
pub const TOKEN_KEY: &str = "token";

#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing CredentialStore");
        Self { secure_store }
    }

    /// Persist both entries, overwriting any previous login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SecureStorageUnavailable`] if either write fails.
    pub async fn save(&self, credentials: &ServerCredentials) -> Result<()> {
        self.write(BASE_URL_KEY, &credentials.base_url).await?;
        self.write(TOKEN_KEY, &credentials.api_key).await?;

        info!(base_url = %credentials.base_url, "Credentials stored securely");
        Ok(())
    }

    /// Load the persisted login.
    ///
    /// Returns `Ok(None)` unless both entries are present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SecureStorageUnavailable`] if the store cannot be
    /// read or an entry is not valid UTF-8.
    pub async fn load(&self) -> Result<Option<ServerCredentials>> {
        let base_url = self.read(BASE_URL_KEY).await?;
        let api_key = self.read(TOKEN_KEY).await?;

        match (base_url, api_key) {
            (Some(base_url), Some(api_key)) if !base_url.is_empty() && !api_key.is_empty() => {
                debug!(base_url = %base_url, "Loaded stored credentials");
                Ok(Some(ServerCredentials::new(base_url, api_key)))
            }
            (None, None) => {
                debug!("No stored credentials");
                Ok(None)
            }
            _ => {
                warn!("Stored credentials are incomplete; ignoring them");
                Ok(None)
            }
        }
    }

    /// Delete both entries. Succeeds when nothing was stored.
    pub async fn clear(&self) -> Result<()> {
        for key in [BASE_URL_KEY, TOKEN_KEY] {
            self.secure_store.delete_secret(key).await.map_err(|e| {
                warn!(key, error = %e, "Failed to delete credential entry");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;
        }

        info!("Stored credentials deleted");
        Ok(())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.secure_store
            .set_secret(key, value.as_bytes())
            .await
            .map_err(|e| {
                warn!(key, error = %e, "Failed to write credential entry");
                AuthError::SecureStorageUnavailable(e.to_string())
            })
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        let data = self.secure_store.get_secret(key).await.map_err(|e| {
            warn!(key, error = %e, "Failed to read credential entry");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        data.map(|bytes| {
            String::from_utf8(bytes).map_err(|_| {
                AuthError::SecureStorageUnavailable(format!("entry '{}' is not valid UTF-8", key))
            })
        })
        .transpose()
    }
}
