//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SecureStore` using the `keyring` crate, under the `ImmichClient` service
//! - `FileSystemAccess` using `tokio::fs`
//!
//! The remote gateway is not provided here; hosts supply their own HTTP
//! implementation of `RemoteGateway`.
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{KeyringSecureStore, TokioFileSystem};
//!
//! let store = KeyringSecureStore::new();
//! let fs = TokioFileSystem::new();
//! ```

mod filesystem;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use filesystem::TokioFileSystem;

#[cfg(feature = "secure-store")]
pub use secure_store::{KeyringSecureStore, DEFAULT_SERVICE_NAME};
