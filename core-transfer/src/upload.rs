//! # Upload Orchestrator
//!
//! Sequences one upload run: discovery, the per-file upload loop, then the
//! organization passes.
//!
//! ## Workflow
//!
//! 1. **Discover**: expand the selected sources into candidate files (on a
//!    blocking thread)
//! 2. **Upload**: for each file in discovery order, poll the cancel flag,
//!    derive the asset identity and upload with bounded retry
//! 3. **Organize**: hand the results to the [`OrganizationEngine`]
//!
//! A cancel request is honoured before the next file starts; an upload in
//! flight always completes. A cancelled run skips organization entirely.
//!
//! Whatever happens inside the worker (error or panic), the slot ends up
//! back in [`RunPhase::Idle`] and a terminal status is published.
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = UploadOrchestrator::new(gateway, event_bus, RetrySettings::default(),
//!     DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| e.to_string()).collect(), "gimmich");
//!
//! let handle = orchestrator.start(vec!["/photos/Trip".into()],
//!     TransferConfiguration::default().with_recursive(true).with_directories_as_albums(true))?;
//!
//! let report = handle.wait().await?;
//! println!("{} uploaded, {} failed", report.succeeded(), report.failed());
//! ```

use crate::config::TransferConfiguration;
use crate::discovery::{discover, CandidateFile};
use crate::error::{Result, TransferError};
use crate::identity::upload_request;
use crate::organization::{OrganizationEngine, OrganizationReport};
use crate::retry::retry_with_policy;
use crate::run::{
    panic_message, RunHandle, RunId, RunPhase, RunSlot, RunStatus, RunTicket, TransferProgress,
};
use bridge_traits::remote::{RemoteGateway, UploadStatus};
use core_async::sync::{watch, CancellationToken};
use core_runtime::config::RetrySettings;
use core_runtime::events::{CoreEvent, EventBus, TransferDirection, TransferEvent};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub const STATUS_IDLE: &str = "Select files to upload";
pub const STATUS_PREPARING: &str = "Preparing to upload...";
pub const STATUS_COMPLETE: &str = "Upload Complete";
pub const STATUS_STOPPED: &str = "Upload stopped";
pub const STATUS_NOTHING: &str = "No files to upload";
pub const STATUS_FAILED: &str = "Upload failed";

// ============================================================================
// Results
// ============================================================================

/// Outcome for one candidate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub source_file: PathBuf,
    /// Absent when the upload failed.
    pub remote_asset_id: Option<String>,
    pub remote_status: Option<UploadStatus>,
    /// Name of the directory holding the file, used for grouping.
    pub parent_directory: String,
    pub caption_path: PathBuf,
    pub attempts: u32,
    pub error: Option<String>,
}

impl UploadResult {
    fn success(candidate: &CandidateFile, asset_id: String, status: UploadStatus, attempts: u32) -> Self {
        Self {
            source_file: candidate.path.clone(),
            remote_asset_id: Some(asset_id),
            remote_status: Some(status),
            parent_directory: candidate.parent_directory.clone(),
            caption_path: candidate.caption_path.clone(),
            attempts,
            error: None,
        }
    }

    fn failure(candidate: &CandidateFile, message: String, attempts: u32) -> Self {
        Self {
            source_file: candidate.path.clone(),
            remote_asset_id: None,
            remote_status: None,
            parent_directory: candidate.parent_directory.clone(),
            caption_path: candidate.caption_path.clone(),
            attempts,
            error: Some(message),
        }
    }

    /// Accepted by the server; duplicates count.
    pub fn is_success(&self) -> bool {
        self.remote_asset_id.is_some()
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.remote_status, Some(UploadStatus::Duplicate))
    }

    pub fn asset_id(&self) -> Option<String> {
        self.remote_asset_id.clone()
    }
}

/// Terminal summary of an upload run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Candidates found by discovery.
    pub total: u64,
    /// One entry per file attempted, in upload order.
    pub results: Vec<UploadResult>,
    /// `None` when organization did not run.
    pub organization: Option<OrganizationReport>,
    pub duration_secs: u64,
}

impl UploadReport {
    fn empty(run_id: RunId, status: RunStatus) -> Self {
        Self {
            run_id,
            status,
            total: 0,
            results: Vec::new(),
            organization: None,
            duration_secs: 0,
        }
    }

    pub fn succeeded(&self) -> u64 {
        self.results.iter().filter(|r| r.is_success()).count() as u64
    }

    pub fn failed(&self) -> u64 {
        self.results.iter().filter(|r| !r.is_success()).count() as u64
    }

    pub fn duplicates(&self) -> u64 {
        self.results.iter().filter(|r| r.is_duplicate()).count() as u64
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns the upload [`RunSlot`] and spawns one worker task per run.
pub struct UploadOrchestrator {
    gateway: Arc<dyn RemoteGateway>,
    event_bus: EventBus,
    retry: RetrySettings,
    extensions: Arc<Vec<String>>,
    device_id: String,
    slot: Arc<RunSlot>,
}

impl UploadOrchestrator {
    /// # Arguments
    ///
    /// * `gateway` - Server the files go to
    /// * `event_bus` - Receives [`TransferEvent`]s
    /// * `retry` - Per-file attempt bound and pause
    /// * `extensions` - Lowercase allow-list, each with a leading dot
    /// * `device_id` - Device name sent with every upload
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        event_bus: EventBus,
        retry: RetrySettings,
        extensions: Vec<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            event_bus,
            retry,
            extensions: Arc::new(extensions),
            device_id: device_id.into(),
            slot: Arc::new(RunSlot::new("upload", STATUS_IDLE)),
        }
    }

    /// Starts a run in the background.
    ///
    /// # Arguments
    ///
    /// * `sources` - Selected files and directories, in selection order
    /// * `config` - Snapshot of the upload options for this run
    ///
    /// # Errors
    ///
    /// - [`TransferError::Configuration`] when `sources` is empty
    /// - [`TransferError::AlreadyRunning`] when a run is in progress
    #[instrument(skip(self, sources, config), fields(sources = sources.len()))]
    pub fn start(
        &self,
        sources: Vec<PathBuf>,
        config: TransferConfiguration,
    ) -> Result<RunHandle<UploadReport>> {
        if sources.is_empty() {
            return Err(TransferError::Configuration(
                "no files or folders selected".to_string(),
            ));
        }

        let ticket = self.slot.try_begin()?;
        let run_id = ticket.run_id;
        info!(run_id = %run_id, recursive = config.recursive, "Starting upload run");

        let orchestrator = self.clone_for_task();
        let handle = core_async::task::spawn(async move {
            let outcome = AssertUnwindSafe(orchestrator.execute(ticket, sources, config))
                .catch_unwind()
                .await;

            let report = match outcome {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => orchestrator.fail(run_id, e.to_string()),
                Err(payload) => orchestrator.fail(run_id, panic_message(payload)),
            };

            orchestrator.slot.finish();
            report
        });

        Ok(RunHandle::new(run_id, handle))
    }

    /// Asks the current run to stop before its next file.
    ///
    /// Returns `false` when no run is active.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn phase(&self) -> RunPhase {
        self.slot.phase()
    }

    pub fn is_running(&self) -> bool {
        !self.slot.is_idle()
    }

    pub fn progress(&self) -> TransferProgress {
        self.slot.progress()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferProgress> {
        self.slot.subscribe()
    }

    fn clone_for_task(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            event_bus: self.event_bus.clone(),
            retry: self.retry,
            extensions: Arc::clone(&self.extensions),
            device_id: self.device_id.clone(),
            slot: Arc::clone(&self.slot),
        }
    }

    // ------------------------------------------------------------------
    // Worker
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(run_id = %ticket.run_id))]
    async fn execute(
        &self,
        ticket: RunTicket,
        sources: Vec<PathBuf>,
        config: TransferConfiguration,
    ) -> Result<UploadReport> {
        let RunTicket { run_id, token } = ticket;
        let started = Instant::now();

        // Phase 1: Discovery
        info!("Phase 1: Discovering files");
        self.slot.report(0, 0, STATUS_PREPARING);

        let extensions = Arc::clone(&self.extensions);
        let recursive = config.recursive;
        let candidates = core_async::task::spawn_blocking(move || {
            discover(&sources, recursive, &extensions)
        })
        .await
        .map_err(|e| TransferError::Internal(format!("discovery task failed: {}", e)))??;

        let total = candidates.len() as u64;
        debug!(total, "Discovery finished");

        if token.is_cancelled() {
            self.slot.advance(RunPhase::Complete)?;
            return Ok(self.stopped(UploadReport {
                total,
                ..UploadReport::empty(run_id, RunStatus::Stopped)
            }));
        }

        if candidates.is_empty() {
            info!("No media files matched the selection");
            self.slot.advance(RunPhase::Complete)?;
            self.slot.report(0, 0, STATUS_NOTHING);
            return Ok(UploadReport::empty(run_id, RunStatus::NothingToDo));
        }

        // Phase 2: Upload
        info!(total, "Phase 2: Uploading");
        self.slot.advance(RunPhase::Transferring)?;
        self.slot.report(0, total, uploading_status(0, total));
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Started {
                run_id: run_id.to_string(),
                direction: TransferDirection::Upload,
                total,
            }))
            .ok();

        let results = self.upload_all(run_id, &candidates, &token).await;

        let mut report = UploadReport {
            run_id,
            status: RunStatus::Completed,
            total,
            results,
            organization: None,
            duration_secs: 0,
        };

        if token.is_cancelled() {
            self.slot.advance(RunPhase::Cancelling)?;
            self.slot.advance(RunPhase::Complete)?;
            report.status = RunStatus::Stopped;
            report.duration_secs = started.elapsed().as_secs();
            return Ok(self.stopped(report));
        }

        // Phase 3: Organization
        if config.has_organization() && report.succeeded() > 0 {
            info!("Phase 3: Organizing");
            self.slot.advance(RunPhase::Organizing)?;
            self.slot.set_status("Organizing uploaded files...");

            let engine =
                OrganizationEngine::new(Arc::clone(&self.gateway), self.event_bus.clone(), run_id);
            let organization = engine.apply(&report.results, &config, &token).await;
            let cancelled = organization.cancelled;
            report.organization = Some(organization);

            if cancelled {
                self.slot.advance(RunPhase::Cancelling)?;
                self.slot.advance(RunPhase::Complete)?;
                report.status = RunStatus::Stopped;
                report.duration_secs = started.elapsed().as_secs();
                return Ok(self.stopped(report));
            }
        }

        self.slot.advance(RunPhase::Complete)?;
        report.duration_secs = started.elapsed().as_secs();
        self.slot.report(total, total, STATUS_COMPLETE);

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            duplicates = report.duplicates(),
            duration_secs = report.duration_secs,
            "Upload run completed"
        );
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Completed {
                run_id: run_id.to_string(),
                direction: TransferDirection::Upload,
                succeeded: report.succeeded(),
                failed: report.failed(),
                duration_secs: report.duration_secs,
            }))
            .ok();

        Ok(report)
    }

    async fn upload_all(
        &self,
        run_id: RunId,
        candidates: &[CandidateFile],
        token: &CancellationToken,
    ) -> Vec<UploadResult> {
        let total = candidates.len() as u64;
        let mut results = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if token.is_cancelled() {
                info!(completed = results.len(), total, "Upload loop stopped");
                break;
            }

            let result = self.upload_one(candidate).await;
            if let Some(message) = &result.error {
                self.event_bus
                    .emit(CoreEvent::Transfer(TransferEvent::ItemFailed {
                        run_id: run_id.to_string(),
                        direction: TransferDirection::Upload,
                        item: candidate.file_name(),
                        message: message.clone(),
                        attempts: result.attempts,
                    }))
                    .ok();
            }
            results.push(result);

            let completed = results.len() as u64;
            let status = uploading_status(completed, total);
            self.slot.report(completed, total, status.clone());
            let progress = self.slot.progress();
            self.event_bus
                .emit(CoreEvent::Transfer(TransferEvent::Progress {
                    run_id: run_id.to_string(),
                    direction: TransferDirection::Upload,
                    completed,
                    total,
                    percent: progress.percent(),
                    status,
                }))
                .ok();
        }

        results
    }

    async fn upload_one(&self, candidate: &CandidateFile) -> UploadResult {
        let file_name = candidate.file_name();

        let request = match upload_request(candidate, &self.device_id).await {
            Ok(request) => request,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Cannot read file for upload");
                return UploadResult::failure(candidate, e.to_string(), 0);
            }
        };

        let gateway = self.gateway.as_ref();
        let request = &request;
        let outcome = retry_with_policy(&self.retry, &file_name, move || gateway.upload(request)).await;

        match outcome.result {
            Ok(uploaded) => {
                debug!(
                    file = %file_name,
                    asset_id = %uploaded.asset_id,
                    status = %uploaded.status,
                    attempts = outcome.attempts,
                    "File uploaded"
                );
                UploadResult::success(candidate, uploaded.asset_id, uploaded.status, outcome.attempts)
            }
            Err(e) => {
                warn!(file = %file_name, attempts = outcome.attempts, error = %e, "Upload failed");
                UploadResult::failure(candidate, e.to_string(), outcome.attempts)
            }
        }
    }

    // ------------------------------------------------------------------
    // Terminal states
    // ------------------------------------------------------------------

    fn stopped(&self, report: UploadReport) -> UploadReport {
        let completed = report.results.len() as u64;
        info!(completed, total = report.total, "Upload run stopped");
        self.slot.report(completed, report.total, STATUS_STOPPED);
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Stopped {
                run_id: report.run_id.to_string(),
                direction: TransferDirection::Upload,
                completed,
                total: report.total,
            }))
            .ok();
        report
    }

    fn fail(&self, run_id: RunId, message: String) -> UploadReport {
        error!(run_id = %run_id, error = %message, "Upload run failed");
        self.slot.set_status(format!("{}: {}", STATUS_FAILED, message));
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Failed {
                run_id: run_id.to_string(),
                direction: TransferDirection::Upload,
                message: message.clone(),
            }))
            .ok();
        UploadReport::empty(run_id, RunStatus::Failed(message))
    }
}

fn uploading_status(completed: u64, total: u64) -> String {
    format!("Uploading... {}/{} files", completed, total)
}
