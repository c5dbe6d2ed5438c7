//! # Catalog Browser
//!
//! Builds download packs from what the server already holds: albums, tags,
//! recognised people, the whole library and smart search results.
//!
//! ## Refresh
//!
//! [`CatalogBrowser::refresh`] is the bulk-info run. It lists albums, tags
//! and people, then resolves the asset ids of every entry so each one is a
//! ready [`DownloadPack`]. It runs in the background through its own
//! [`RunSlot`], independent of uploads and downloads.
//!
//! A section whose listing fails is reported in
//! [`CatalogSnapshot::failed_sections`]; an entry whose assets cannot be
//! listed is left out and named in [`CatalogSnapshot::failed_entries`].
//! Neither aborts the refresh.

use crate::download::{DownloadPack, PackSource};
use crate::error::{Result, TransferError};
use crate::run::{
    panic_message, RunHandle, RunId, RunPhase, RunSlot, RunStatus, RunTicket, TransferProgress,
};
use bridge_traits::error::BridgeError;
use bridge_traits::remote::RemoteGateway;
use chrono::{DateTime, Utc};
use core_async::sync::watch;
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub const LIBRARY_PACK_NAME: &str = "All Assets";

pub const STATUS_IDLE: &str = "Catalog not loaded";
pub const STATUS_LOADING: &str = "Loading catalog...";
pub const STATUS_REFRESHED: &str = "Catalog refreshed";
pub const STATUS_STOPPED: &str = "Catalog refresh stopped";
pub const STATUS_FAILED: &str = "Catalog refresh failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSection {
    Albums,
    Tags,
    People,
}

impl CatalogSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogSection::Albums => "albums",
            CatalogSection::Tags => "tags",
            CatalogSection::People => "people",
        }
    }
}

impl fmt::Display for CatalogSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Sorted by name.
    pub albums: Vec<DownloadPack>,
    /// Sorted by name.
    pub tags: Vec<DownloadPack>,
    /// In server order.
    pub people: Vec<DownloadPack>,
    pub failed_sections: Vec<CatalogSection>,
    /// `"<section>/<name>"` for entries whose assets could not be listed.
    pub failed_entries: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            albums: Vec::new(),
            tags: Vec::new(),
            people: Vec::new(),
            failed_sections: Vec::new(),
            failed_entries: Vec::new(),
            refreshed_at: Utc::now(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_sections.is_empty() || !self.failed_entries.is_empty()
    }

    pub fn section(&self, section: CatalogSection) -> &[DownloadPack] {
        match section {
            CatalogSection::Albums => &self.albums,
            CatalogSection::Tags => &self.tags,
            CatalogSection::People => &self.people,
        }
    }
}

/// Listed entry whose assets are not resolved yet.
struct PendingEntry {
    section: CatalogSection,
    name: String,
    source: PackSource,
}

// ============================================================================
// Browser
// ============================================================================

pub struct CatalogBrowser {
    gateway: Arc<dyn RemoteGateway>,
    event_bus: EventBus,
    search_limit: usize,
    slot: Arc<RunSlot>,
    latest: Arc<Mutex<Option<CatalogSnapshot>>>,
}

impl CatalogBrowser {
    /// # Arguments
    ///
    /// * `search_limit` - Maximum smart search results per query
    pub fn new(gateway: Arc<dyn RemoteGateway>, event_bus: EventBus, search_limit: usize) -> Self {
        Self {
            gateway,
            event_bus,
            search_limit,
            slot: Arc::new(RunSlot::new("catalog", STATUS_IDLE)),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts a background refresh.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::AlreadyRunning`] while a refresh is running.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Result<RunHandle<CatalogSnapshot>> {
        let ticket = self.slot.try_begin()?;
        let run_id = ticket.run_id;
        info!(run_id = %run_id, "Starting catalog refresh");

        let browser = self.clone_for_task();
        let handle = core_async::task::spawn(async move {
            let outcome = AssertUnwindSafe(browser.execute(ticket))
                .catch_unwind()
                .await;

            let snapshot = match outcome {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(e)) => browser.fail(run_id, e.to_string()),
                Err(payload) => browser.fail(run_id, panic_message(payload)),
            };

            if matches!(snapshot.status, RunStatus::Completed) {
                *browser.latest.lock() = Some(snapshot.clone());
            }
            browser.slot.finish();
            snapshot
        });

        Ok(RunHandle::new(run_id, handle))
    }

    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn phase(&self) -> RunPhase {
        self.slot.phase()
    }

    pub fn progress(&self) -> TransferProgress {
        self.slot.progress()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferProgress> {
        self.slot.subscribe()
    }

    /// Last refresh that ran to completion.
    pub fn latest(&self) -> Option<CatalogSnapshot> {
        self.latest.lock().clone()
    }

    /// Pack holding every asset in the library.
    pub async fn library_pack(&self) -> Result<DownloadPack> {
        let ids = self
            .gateway
            .list_all_assets()
            .await
            .map_err(|e| TransferError::Gateway(format!("cannot list library: {}", e)))?;
        debug!(assets = ids.len(), "Library listed");
        Ok(DownloadPack::new(LIBRARY_PACK_NAME, PackSource::Library, ids))
    }

    /// Pack of the best smart search matches for `query`, named after it.
    ///
    /// # Errors
    ///
    /// - [`TransferError::Configuration`] for a blank query
    /// - [`TransferError::Gateway`] when the search call fails
    #[instrument(skip(self))]
    pub async fn smart_search(&self, query: &str) -> Result<DownloadPack> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TransferError::Configuration("empty search query".to_string()));
        }

        let ids = self
            .gateway
            .smart_search(query, self.search_limit)
            .await
            .map_err(|e| TransferError::Gateway(format!("smart search failed: {}", e)))?;

        info!(query, results = ids.len(), "Smart search completed");
        self.event_bus
            .emit(CoreEvent::Catalog(CatalogEvent::SearchCompleted {
                query: query.to_string(),
                results: ids.len() as u64,
            }))
            .ok();

        Ok(DownloadPack::new(
            query,
            PackSource::Search {
                query: query.to_string(),
            },
            ids,
        ))
    }

    fn clone_for_task(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            event_bus: self.event_bus.clone(),
            search_limit: self.search_limit,
            slot: Arc::clone(&self.slot),
            latest: Arc::clone(&self.latest),
        }
    }

    // ------------------------------------------------------------------
    // Worker
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(run_id = %ticket.run_id))]
    async fn execute(&self, ticket: RunTicket) -> Result<CatalogSnapshot> {
        let RunTicket { run_id, token } = ticket;
        let mut snapshot = CatalogSnapshot::new(run_id);

        // Phase 1: list sections
        info!("Phase 1: Listing catalog sections");
        self.slot.report(0, 0, STATUS_LOADING);
        let pending = self.list_sections(&mut snapshot).await;

        if token.is_cancelled() {
            self.slot.advance(RunPhase::Complete)?;
            return Ok(self.stopped(snapshot));
        }

        // Phase 2: resolve assets per entry
        let total = pending.len() as u64;
        info!(entries = total, "Phase 2: Resolving entry assets");
        self.slot.advance(RunPhase::Transferring)?;
        self.slot.report(0, total, loading_status(0, total));

        for (index, entry) in pending.into_iter().enumerate() {
            if token.is_cancelled() {
                break;
            }

            match self.entry_assets(&entry.source).await {
                Ok(ids) => {
                    let pack = DownloadPack::new(entry.name, entry.source, ids);
                    match entry.section {
                        CatalogSection::Albums => snapshot.albums.push(pack),
                        CatalogSection::Tags => snapshot.tags.push(pack),
                        CatalogSection::People => snapshot.people.push(pack),
                    }
                }
                Err(e) => {
                    warn!(section = %entry.section, name = %entry.name, error = %e, "Cannot list entry assets");
                    snapshot
                        .failed_entries
                        .push(format!("{}/{}", entry.section, entry.name));
                }
            }

            let done = index as u64 + 1;
            self.slot.report(done, total, loading_status(done, total));
        }

        if token.is_cancelled() {
            self.slot.advance(RunPhase::Cancelling)?;
            self.slot.advance(RunPhase::Complete)?;
            return Ok(self.stopped(snapshot));
        }

        self.slot.advance(RunPhase::Complete)?;
        snapshot.refreshed_at = Utc::now();
        self.slot.report(total, total, STATUS_REFRESHED);

        info!(
            albums = snapshot.albums.len(),
            tags = snapshot.tags.len(),
            people = snapshot.people.len(),
            partial = snapshot.is_partial(),
            "Catalog refreshed"
        );
        self.event_bus
            .emit(CoreEvent::Catalog(CatalogEvent::Refreshed {
                albums: snapshot.albums.len() as u64,
                tags: snapshot.tags.len() as u64,
                people: snapshot.people.len() as u64,
                failed_sections: snapshot
                    .failed_sections
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            }))
            .ok();

        Ok(snapshot)
    }

    async fn list_sections(&self, snapshot: &mut CatalogSnapshot) -> Vec<PendingEntry> {
        let mut pending = Vec::new();

        match self.gateway.list_albums().await {
            Ok(albums) => pending.extend(sorted(albums).into_iter().map(|(name, id)| PendingEntry {
                section: CatalogSection::Albums,
                name,
                source: PackSource::Album { id },
            })),
            Err(e) => self.section_failed(snapshot, CatalogSection::Albums, &e),
        }

        match self.gateway.list_tags().await {
            Ok(tags) => pending.extend(sorted(tags).into_iter().map(|(name, id)| PendingEntry {
                section: CatalogSection::Tags,
                name,
                source: PackSource::Tag { id },
            })),
            Err(e) => self.section_failed(snapshot, CatalogSection::Tags, &e),
        }

        match self.gateway.list_people().await {
            Ok(people) => pending.extend(people.into_iter().map(|person| {
                let name = if person.name.trim().is_empty() {
                    person.id.clone()
                } else {
                    person.name
                };
                PendingEntry {
                    section: CatalogSection::People,
                    name,
                    source: PackSource::Person { id: person.id },
                }
            })),
            Err(e) => self.section_failed(snapshot, CatalogSection::People, &e),
        }

        pending
    }

    fn section_failed(&self, snapshot: &mut CatalogSnapshot, section: CatalogSection, error: &BridgeError) {
        warn!(section = %section, error = %error, "Catalog section unavailable");
        snapshot.failed_sections.push(section);
    }

    async fn entry_assets(&self, source: &PackSource) -> std::result::Result<Vec<String>, BridgeError> {
        match source {
            PackSource::Album { id } => self.gateway.list_album_assets(id).await,
            PackSource::Tag { id } => self.gateway.list_tag_assets(id).await,
            PackSource::Person { id } => self.gateway.list_person_assets(id).await,
            PackSource::Library => self.gateway.list_all_assets().await,
            PackSource::Search { query } => self.gateway.smart_search(query, self.search_limit).await,
        }
    }

    fn stopped(&self, mut snapshot: CatalogSnapshot) -> CatalogSnapshot {
        info!("Catalog refresh stopped");
        self.slot.set_status(STATUS_STOPPED);
        snapshot.status = RunStatus::Stopped;
        snapshot
    }

    fn fail(&self, run_id: RunId, message: String) -> CatalogSnapshot {
        error!(run_id = %run_id, error = %message, "Catalog refresh failed");
        self.slot.set_status(format!("{}: {}", STATUS_FAILED, message));
        self.event_bus
            .emit(CoreEvent::Catalog(CatalogEvent::RefreshFailed {
                message: message.clone(),
            }))
            .ok();

        let mut snapshot = CatalogSnapshot::new(run_id);
        snapshot.status = RunStatus::Failed(message);
        snapshot
    }
}

fn loading_status(done: u64, total: u64) -> String {
    format!("Loading catalog... {}/{}", done, total)
}

fn sorted(entries: std::collections::HashMap<String, String>) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = entries.into_iter().collect();
    entries.sort();
    entries
}
