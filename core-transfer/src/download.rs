//! # Download Orchestrator
//!
//! Saves queued packs of remote assets into a local folder.
//!
//! ## Queue
//!
//! A [`DownloadQueue`] is the ordered list of [`DownloadPack`]s the user has
//! collected from the catalog. It is a plain value; the host renders it and
//! hands a snapshot to [`DownloadOrchestrator::start`].
//!
//! ## Layout on disk
//!
//! ```text
//! <save_path>/<pack name>/<original file name>
//! <save_path>/<pack name>/<original stem>.txt    (optional sidecar)
//! ```
//!
//! Pack and file names are made safe for the filesystem. A name already
//! taken inside the pack directory, on disk or earlier in the run, gets a
//! ` (n)` suffix before the extension.
//!
//! Each asset download uses the same bounded retry as uploads. Cancellation
//! is polled before every asset.

use crate::config::DownloadConfiguration;
use crate::error::Result;
use crate::retry::retry_with_policy;
use crate::run::{
    panic_message, RunHandle, RunId, RunPhase, RunSlot, RunStatus, RunTicket, TransferProgress,
};
use bridge_traits::remote::RemoteGateway;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_async::sync::{watch, CancellationToken};
use core_runtime::config::RetrySettings;
use core_runtime::events::{CoreEvent, EventBus, TransferDirection, TransferEvent};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub const STATUS_IDLE: &str = "Add packs to download";
pub const STATUS_PREPARING: &str = "Preparing to download...";
pub const STATUS_COMPLETE: &str = "Download Complete";
pub const STATUS_STOPPED: &str = "Download stopped";
pub const STATUS_NOTHING: &str = "No assets to download";
pub const STATUS_FAILED: &str = "Download failed";

const UNTITLED: &str = "Untitled";

// ============================================================================
// Queue
// ============================================================================

/// Where a pack's asset ids came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackSource {
    Album { id: String },
    Tag { id: String },
    Person { id: String },
    Library,
    Search { query: String },
}

/// A named, ordered group of assets downloaded together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPack {
    pub name: String,
    pub source: PackSource,
    pub asset_ids: Vec<String>,
}

impl DownloadPack {
    pub fn new(name: impl Into<String>, source: PackSource, asset_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source,
            asset_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.asset_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }
}

/// Packs waiting to be downloaded, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadQueue {
    packs: Vec<DownloadPack>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pack: DownloadPack) {
        debug!(pack = %pack.name, assets = pack.len(), "Pack queued");
        self.packs.push(pack);
    }

    /// Removes the pack at `index`; `None` when out of range.
    pub fn remove(&mut self, index: usize) -> Option<DownloadPack> {
        if index < self.packs.len() {
            Some(self.packs.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.packs.clear();
    }

    pub fn packs(&self) -> &[DownloadPack] {
        &self.packs
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    pub fn total_assets(&self) -> usize {
        self.packs.iter().map(DownloadPack::len).sum()
    }

    /// Copy handed to a run; later edits to the queue do not affect it.
    pub fn snapshot(&self) -> Vec<DownloadPack> {
        self.packs.clone()
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub pack: String,
    pub asset_id: String,
    /// Written file; absent when the asset failed.
    pub path: Option<PathBuf>,
    pub sidecar: Option<PathBuf>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        self.path.is_some()
    }

    fn failure(pack: &str, asset_id: &str, message: String, attempts: u32) -> Self {
        Self {
            pack: pack.to_string(),
            asset_id: asset_id.to_string(),
            path: None,
            sidecar: None,
            attempts,
            error: Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub total: u64,
    pub results: Vec<DownloadResult>,
    pub duration_secs: u64,
}

impl DownloadReport {
    fn empty(run_id: RunId, status: RunStatus) -> Self {
        Self {
            run_id,
            status,
            total: 0,
            results: Vec::new(),
            duration_secs: 0,
        }
    }

    pub fn succeeded(&self) -> u64 {
        self.results.iter().filter(|r| r.is_success()).count() as u64
    }

    pub fn failed(&self) -> u64 {
        self.results.iter().filter(|r| !r.is_success()).count() as u64
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct DownloadOrchestrator {
    gateway: Arc<dyn RemoteGateway>,
    event_bus: EventBus,
    file_system: Arc<dyn FileSystemAccess>,
    retry: RetrySettings,
    slot: Arc<RunSlot>,
}

impl DownloadOrchestrator {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        event_bus: EventBus,
        file_system: Arc<dyn FileSystemAccess>,
        retry: RetrySettings,
    ) -> Self {
        Self {
            gateway,
            event_bus,
            file_system,
            retry,
            slot: Arc::new(RunSlot::new("download", STATUS_IDLE)),
        }
    }

    /// Starts downloading `packs` in the background.
    ///
    /// # Errors
    ///
    /// - [`TransferError::Configuration`](crate::TransferError::Configuration) when no save path is selected; the
    ///   run does not begin
    /// - [`TransferError::AlreadyRunning`](crate::TransferError::AlreadyRunning) when a download is in progress
    #[instrument(skip(self, packs, config), fields(packs = packs.len()))]
    pub fn start(
        &self,
        packs: Vec<DownloadPack>,
        config: DownloadConfiguration,
    ) -> Result<RunHandle<DownloadReport>> {
        let save_path = config.require_save_path()?.clone();

        let ticket = self.slot.try_begin()?;
        let run_id = ticket.run_id;
        info!(run_id = %run_id, save_path = %save_path.display(), "Starting download run");

        let orchestrator = self.clone_for_task();
        let handle = core_async::task::spawn(async move {
            let outcome = AssertUnwindSafe(orchestrator.execute(ticket, packs, save_path, config))
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

    /// Asks the current run to stop before its next asset.
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
            file_system: Arc::clone(&self.file_system),
            retry: self.retry,
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
        packs: Vec<DownloadPack>,
        save_path: PathBuf,
        config: DownloadConfiguration,
    ) -> Result<DownloadReport> {
        let RunTicket { run_id, token } = ticket;
        let started = Instant::now();

        info!("Phase 1: Preparing download");
        self.slot.report(0, 0, STATUS_PREPARING);

        let total: u64 = packs.iter().map(|p| p.len() as u64).sum();
        if total == 0 {
            info!("Download queue holds no assets");
            self.slot.advance(RunPhase::Complete)?;
            self.slot.report(0, 0, STATUS_NOTHING);
            return Ok(DownloadReport::empty(run_id, RunStatus::NothingToDo));
        }

        info!(total, packs = packs.len(), "Phase 2: Downloading");
        self.slot.advance(RunPhase::Transferring)?;
        self.slot.report(0, total, downloading_status(0, total));
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Started {
                run_id: run_id.to_string(),
                direction: TransferDirection::Download,
                total,
            }))
            .ok();

        let mut report = DownloadReport {
            run_id,
            status: RunStatus::Completed,
            total,
            results: Vec::with_capacity(total as usize),
            duration_secs: 0,
        };

        for pack in &packs {
            if token.is_cancelled() {
                break;
            }
            self.download_pack(run_id, pack, &save_path, &config, &token, &mut report)
                .await;
        }

        report.duration_secs = started.elapsed().as_secs();

        if token.is_cancelled() {
            self.slot.advance(RunPhase::Cancelling)?;
            self.slot.advance(RunPhase::Complete)?;
            report.status = RunStatus::Stopped;
            let completed = report.results.len() as u64;
            info!(completed, total, "Download run stopped");
            self.slot.report(completed, total, STATUS_STOPPED);
            self.event_bus
                .emit(CoreEvent::Transfer(TransferEvent::Stopped {
                    run_id: run_id.to_string(),
                    direction: TransferDirection::Download,
                    completed,
                    total,
                }))
                .ok();
            return Ok(report);
        }

        self.slot.advance(RunPhase::Complete)?;
        self.slot.report(total, total, STATUS_COMPLETE);
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            duration_secs = report.duration_secs,
            "Download run completed"
        );
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Completed {
                run_id: run_id.to_string(),
                direction: TransferDirection::Download,
                succeeded: report.succeeded(),
                failed: report.failed(),
                duration_secs: report.duration_secs,
            }))
            .ok();

        Ok(report)
    }

    async fn download_pack(
        &self,
        run_id: RunId,
        pack: &DownloadPack,
        save_path: &Path,
        config: &DownloadConfiguration,
        token: &CancellationToken,
        report: &mut DownloadReport,
    ) {
        let directory = save_path.join(sanitize_file_name(&pack.name));
        debug!(pack = %pack.name, directory = %directory.display(), "Downloading pack");

        let directory_error = self
            .file_system
            .create_dir_all(&directory)
            .await
            .err()
            .map(|e| format!("cannot create {}: {}", directory.display(), e));

        let mut taken = HashSet::new();

        for asset_id in &pack.asset_ids {
            if token.is_cancelled() {
                return;
            }

            let result = match &directory_error {
                Some(message) => DownloadResult::failure(&pack.name, asset_id, message.clone(), 0),
                None => {
                    self.download_asset(&pack.name, asset_id, &directory, config, &mut taken)
                        .await
                }
            };

            if let Some(message) = &result.error {
                warn!(pack = %pack.name, asset_id = %asset_id, error = %message, "Asset download failed");
                self.event_bus
                    .emit(CoreEvent::Transfer(TransferEvent::ItemFailed {
                        run_id: run_id.to_string(),
                        direction: TransferDirection::Download,
                        item: asset_id.clone(),
                        message: message.clone(),
                        attempts: result.attempts,
                    }))
                    .ok();
            }
            report.results.push(result);

            let completed = report.results.len() as u64;
            let status = downloading_status(completed, report.total);
            self.slot.report(completed, report.total, status.clone());
            self.event_bus
                .emit(CoreEvent::Transfer(TransferEvent::Progress {
                    run_id: run_id.to_string(),
                    direction: TransferDirection::Download,
                    completed,
                    total: report.total,
                    percent: self.slot.progress().percent(),
                    status,
                }))
                .ok();
        }
    }

    async fn download_asset(
        &self,
        pack: &str,
        asset_id: &str,
        directory: &Path,
        config: &DownloadConfiguration,
        taken: &mut HashSet<String>,
    ) -> DownloadResult {
        let gateway = self.gateway.as_ref();

        let name = retry_with_policy(&self.retry, asset_id, move || {
            gateway.get_original_filename(asset_id)
        })
        .await;
        let original_name = match name.result {
            Ok(name) => name,
            Err(e) => {
                warn!(asset_id, error = %e, "Original file name unavailable; using asset id");
                asset_id.to_string()
            }
        };

        let outcome =
            retry_with_policy(&self.retry, asset_id, move || gateway.download_asset(asset_id)).await;
        let data: Bytes = match outcome.result {
            Ok(data) => data,
            Err(e) => return DownloadResult::failure(pack, asset_id, e.to_string(), outcome.attempts),
        };

        let file_name = match self
            .unique_file_name(directory, &sanitize_file_name(&original_name), taken)
            .await
        {
            Ok(name) => name,
            Err(e) => return DownloadResult::failure(pack, asset_id, e.to_string(), outcome.attempts),
        };
        let path = directory.join(&file_name);

        if let Err(e) = self.file_system.write_file(&path, data).await {
            return DownloadResult::failure(pack, asset_id, e.to_string(), outcome.attempts);
        }
        debug!(asset_id, path = %path.display(), "Asset saved");

        let sidecar = if config.writes_sidecar() {
            self.write_sidecar(asset_id, directory, &file_name, config, taken)
                .await
        } else {
            None
        };

        DownloadResult {
            pack: pack.to_string(),
            asset_id: asset_id.to_string(),
            path: Some(path),
            sidecar,
            attempts: outcome.attempts,
            error: None,
        }
    }

    /// Picks a name unused in `directory` by this run and on disk.
    async fn unique_file_name(
        &self,
        directory: &Path,
        name: &str,
        taken: &mut HashSet<String>,
    ) -> Result<String> {
        let (stem, extension) = split_extension(name);
        let mut candidate = name.to_string();
        let mut counter = 1;

        loop {
            if !taken.contains(&candidate)
                && !self.file_system.exists(&directory.join(&candidate)).await?
            {
                taken.insert(candidate.clone());
                return Ok(candidate);
            }
            candidate = match extension {
                Some(ext) => format!("{} ({}).{}", stem, counter, ext),
                None => format!("{} ({})", stem, counter),
            };
            counter += 1;
        }
    }

    /// Writes `<stem>.txt` next to the asset. The name goes through the same
    /// collision check as assets, so an existing `.txt` or another asset's
    /// sidecar is never replaced. Failures are logged only.
    async fn write_sidecar(
        &self,
        asset_id: &str,
        directory: &Path,
        asset_file_name: &str,
        config: &DownloadConfiguration,
        taken: &mut HashSet<String>,
    ) -> Option<PathBuf> {
        let mut lines = Vec::new();

        if config.export_descriptions {
            match self.gateway.get_asset_description(asset_id).await {
                Ok(Some(description)) if !description.trim().is_empty() => {
                    lines.push(description.trim().to_string())
                }
                Ok(_) => {}
                Err(e) => warn!(asset_id, error = %e, "Description unavailable"),
            }
        }

        if config.export_tags {
            match self.gateway.get_asset_tags(asset_id).await {
                Ok(tags) if !tags.is_empty() => lines.push(tags.join(&config.caption_delimiter)),
                Ok(_) => {}
                Err(e) => warn!(asset_id, error = %e, "Tags unavailable"),
            }
        }

        if lines.is_empty() {
            return None;
        }

        let (stem, _) = split_extension(asset_file_name);
        let sidecar_name = match self
            .unique_file_name(directory, &format!("{}.txt", stem), taken)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                warn!(asset_id, error = %e, "No free sidecar name");
                return None;
            }
        };
        let sidecar = directory.join(sidecar_name);
        match self
            .file_system
            .write_file(&sidecar, Bytes::from(lines.join("\n")))
            .await
        {
            Ok(()) => Some(sidecar),
            Err(e) => {
                warn!(path = %sidecar.display(), error = %e, "Failed to write sidecar");
                None
            }
        }
    }

    fn fail(&self, run_id: RunId, message: String) -> DownloadReport {
        error!(run_id = %run_id, error = %message, "Download run failed");
        self.slot.set_status(format!("{}: {}", STATUS_FAILED, message));
        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::Failed {
                run_id: run_id.to_string(),
                direction: TransferDirection::Download,
                message: message.clone(),
            }))
            .ok();
        DownloadReport::empty(run_id, RunStatus::Failed(message))
    }
}

fn downloading_status(completed: u64, total: u64) -> String {
    format!("Downloading... {}/{} assets", completed, total)
}

/// Replaces path separators and characters Windows rejects, and trims
/// trailing dots and spaces.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches(['.', ' ']);

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        UNTITLED.to_string()
    } else {
        cleaned.to_string()
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(index) if index > 0 => (&name[..index], Some(&name[index + 1..])),
        _ => (name, None),
    }
}
