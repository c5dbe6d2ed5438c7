//! Async filesystem helpers re-exported from the underlying runtime.
//!
//! Used for the small reads the engine performs next to a run (file metadata
//! for asset identity, caption sidecars). Bulk writes go through the
//! `FileSystemAccess` bridge instead.

pub use tokio::fs::{metadata, read_to_string};
