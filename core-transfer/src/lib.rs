//! # Transfer Engine
//!
//! Batch upload, download and catalog runs against a remote photo server.
//!
//! ## Overview
//!
//! A run turns a configuration snapshot into a cancellable, progress-reporting
//! pipeline on a background task:
//! - Discovering media files under the selected paths
//! - Uploading each file with bounded retry under a stable asset identity
//! - Filing uploads into albums and tags, and importing captions
//! - Saving queued packs of remote assets to disk
//! - Refreshing the album, tag and people catalog
//!
//! ## Components
//!
//! - **Discovery** (`discovery`): Expands selected paths into candidate files
//! - **Run State Machine** (`run`): Validated phases, cancellation and progress per run kind
//! - **Retry** (`retry`): Bounded retry for per-item gateway calls
//! - **Organization Engine** (`organization`): Create-or-reuse albums and tags, caption import
//! - **Upload Orchestrator** (`upload`): Discovery, upload loop, organization
//! - **Download Orchestrator** (`download`): Download queue and pack downloads
//! - **Catalog Browser** (`catalog`): Bulk-info refresh and smart search packs

pub mod captions;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod download;
pub mod error;
pub mod identity;
pub mod organization;
pub mod retry;
pub mod run;
pub mod upload;

pub use catalog::{CatalogBrowser, CatalogSection, CatalogSnapshot, LIBRARY_PACK_NAME};
pub use config::{DownloadConfiguration, TransferConfiguration};
pub use discovery::{discover, is_media_file, CandidateFile};
pub use download::{
    DownloadOrchestrator, DownloadPack, DownloadQueue, DownloadReport, DownloadResult, PackSource,
};
pub use error::{Result, TransferError};
pub use identity::device_asset_id;
pub use organization::{
    OrganizationEngine, OrganizationFailure, OrganizationPass, OrganizationReport,
};
pub use retry::{retry_with_policy, RetryOutcome};
pub use run::{RunHandle, RunId, RunPhase, RunSlot, RunStatus, TransferProgress};
pub use upload::{UploadOrchestrator, UploadReport, UploadResult};
