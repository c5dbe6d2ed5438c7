//! # Host Bridge Traits
//!
//! Contracts between the transfer engine and everything outside it.
//!
//! ## Overview
//!
//! The engine orchestrates; it does not talk to the network, the keychain or
//! the UI directly. Each capability it needs is a trait here, implemented by
//! the host (`bridge-desktop` on desktop) or by test doubles.
//!
//! ## Traits
//!
//! ### Remote server
//! - [`RemoteGateway`](remote::RemoteGateway) - Upload/download, albums, tags, descriptions, catalog
//! - [`GatewayFactory`](remote::GatewayFactory) - Builds a gateway for one login
//!
//! ### Storage
//! - [`SecureStore`](storage::SecureStore) - Persisted login (Keychain/Credential Manager/libsecret)
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Writes for downloaded assets
//!
//! ### Diagnostics
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to the host console
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep messages actionable
//! (include the path, asset id or HTTP status involved).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; a run's worker task holds them
//! across await points.

pub mod error;
pub mod logging;
pub mod remote;
pub mod storage;

pub use error::BridgeError;

pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use remote::{
    AssetStatistics, GatewayFactory, PersonSummary, RemoteGateway, ServerCredentials,
    UploadRequest, UploadStatus, UploadedAsset, UserInfo,
};
pub use storage::{FileSystemAccess, SecureStore};
