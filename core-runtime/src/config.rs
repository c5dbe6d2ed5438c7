//! # Core Configuration Module
//!
//! Process-wide settings and injected bridges for the transfer engine.
//!
//! ## Overview
//!
//! [`CoreConfig`] is built with [`CoreConfigBuilder`] and validated before
//! use. It carries the bridges every run needs (credential store, file system
//! for downloads, optional console sink) together with the tunables the runs
//! share: the retry policy, the media allow-list and the event buffer size.
//!
//! ## Required Dependencies
//!
//! - `SecureStore` - Persisted login
//! - `FileSystemAccess` - Download writes
//!
//! When the `desktop-shims` feature is enabled, `KeyringSecureStore` and
//! `TokioFileSystem` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, RetrySettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .secure_store(Arc::new(MySecureStore))
//!     .file_system(Arc::new(MyFileSystem))
//!     .retry(RetrySettings::default().with_max_attempts(5))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Missing bridges surface as [`Error::CapabilityMissing`] with a message
//! naming what to inject; invalid values surface as [`Error::Config`].

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, LoggerSink, SecureStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Media file suffixes accepted by discovery (compared case-insensitively).
///
/// Raw camera formats, still images, then video containers.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    ".3fr", ".ari", ".arw", ".cap", ".cin", ".cr2", ".cr3", ".crw", ".dcr", ".dng", ".erf",
    ".fff", ".iiq", ".k25", ".kdc", ".mrw", ".nef", ".nrw", ".orf", ".ori", ".pef", ".psd",
    ".raf", ".raw", ".rw2", ".rwl", ".sr2", ".srf", ".srw", ".x3f", ".avif", ".bmp", ".gif",
    ".heic", ".heif", ".hif", ".insp", ".jpe", ".jpeg", ".jpg", ".jxl", ".png", ".svg", ".tif",
    ".tiff", ".webp", ".3gp", ".3gpp", ".avi", ".flv", ".insv", ".m2ts", ".m4v", ".mkv", ".mov",
    ".mp4", ".mpe", ".mpeg", ".mpg", ".mts", ".vob", ".webm", ".wmv",
];

/// Device identifier reported when the host cannot be identified.
pub const DEFAULT_DEVICE_ID: &str = "gimmich";

/// Sources of a stable machine identity, tried in order.
const MACHINE_ID_FILES: &[&str] = &[
    "/etc/machine-id",
    "/var/lib/dbus/machine-id",
    "/etc/hostname",
];
const HOST_NAME_VARS: &[&str] = &["COMPUTERNAME", "HOSTNAME"];

/// Per-machine device identifier: a name-based UUID of the host's machine id
/// or host name, falling back to [`DEFAULT_DEVICE_ID`].
///
/// The same host always yields the same id, so the server keeps attributing
/// uploads from one installation to one device.
pub fn default_device_id() -> String {
    host_identity()
        .map(|identity| device_id_for_host(&identity))
        .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string())
}

fn device_id_for_host(identity: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_bytes()).to_string()
}

fn host_identity() -> Option<String> {
    let from_files = MACHINE_ID_FILES
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok());
    let from_env = HOST_NAME_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok());

    from_files
        .chain(from_env)
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Default number of results requested from smart search.
pub const DEFAULT_SMART_SEARCH_LIMIT: usize = 20;

/// Bounded retry with a fixed pause between attempts.
///
/// Applies to per-item network calls (upload, download). Organization calls
/// are single-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetrySettings {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy needs at least one attempt".to_string(),
            ));
        }

        if self.delay > Duration::from_secs(300) {
            return Err(Error::Config(
                "Retry delay exceeds maximum of 300 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Persisted login storage
    pub secure_store: Arc<dyn SecureStore>,

    /// Target for downloaded assets and caption sidecars
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Host console that mirrors log output (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Retry policy for per-item transfers
    pub retry: RetrySettings,

    /// Lowercase suffixes including the leading dot
    pub media_extensions: Vec<String>,

    /// Broadcast buffer of the event bus
    pub event_buffer_size: usize,

    /// Result cap for smart search
    pub smart_search_limit: usize,

    /// Device identifier sent with uploads
    pub device_id: String,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("secure_store", &"SecureStore { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("retry", &self.retry)
            .field("media_extensions", &self.media_extensions.len())
            .field("event_buffer_size", &self.event_buffer_size)
            .field("smart_search_limit", &self.smart_search_limit)
            .field("device_id", &self.device_id)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The retry policy has at least one attempt and a sane delay
    /// - The allow-list is non-empty and every entry starts with a dot
    /// - Event buffer and search limit are non-zero
    /// - The device id is not blank
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;

        if self.media_extensions.is_empty() {
            return Err(Error::Config(
                "Media extension allow-list cannot be empty".to_string(),
            ));
        }

        if let Some(bad) = self
            .media_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(Error::Config(format!(
                "Media extension '{}' must start with '.' and name a suffix",
                bad
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.smart_search_limit == 0 {
            return Err(Error::Config(
                "Smart search limit must be greater than 0".to_string(),
            ));
        }

        if self.device_id.trim().is_empty() {
            return Err(Error::Config("Device id cannot be blank".to_string()));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required to persist the server login. \
                 Desktop: enable the 'desktop-shims' feature to use KeyringSecureStore. \
                 Otherwise inject a platform credential store."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required to write downloads. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    secure_store: Option<Arc<dyn SecureStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    retry: Option<RetrySettings>,
    media_extensions: Option<Vec<String>>,
    event_buffer_size: Option<usize>,
    smart_search_limit: Option<usize>,
    device_id: Option<String>,
}

impl CoreConfigBuilder {
    /// Sets the credential store holding the server login.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the file system used by download runs.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the host console sink.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Replaces the media allow-list. Entries are normalised to lowercase
    /// and given a leading dot when it is missing.
    pub fn media_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.media_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        );
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn smart_search_limit(mut self, limit: usize) -> Self {
        self.smart_search_limit = Some(limit);
        self
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge was not provided
    ///   and no desktop default is available
    /// - [`Error::Config`] when a value fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            secure_store,
            file_system,
            logger_sink: self.logger_sink,
            retry: self.retry.unwrap_or_default(),
            media_extensions: self.media_extensions.unwrap_or_else(|| {
                DEFAULT_MEDIA_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            smart_search_limit: self
                .smart_search_limit
                .unwrap_or(DEFAULT_SMART_SEARCH_LIMIT),
            device_id: self.device_id.unwrap_or_else(default_device_id),
        };

        config.validate()?;

        Ok(config)
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') || ext.is_empty() {
        ext
    } else {
        format!(".{}", ext)
    }
}
