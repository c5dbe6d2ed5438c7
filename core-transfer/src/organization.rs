//! # Organization Engine
//!
//! Files successful uploads into albums and tags and imports captions.
//!
//! ## Passes
//!
//! Run in this fixed order, each only when enabled:
//!
//! 1. Named album receiving every uploaded asset
//! 2. One album per parent directory
//! 3. Named tag attached to every uploaded asset
//! 4. One tag per parent directory
//! 5. Caption text pushed as the asset description
//! 6. Caption text split into tags
//!
//! ## Create-or-reuse
//!
//! Album and tag listings are fetched at most once per run into a name → id
//! snapshot. A missing name is created remotely and inserted into the
//! snapshot before the next lookup, so every distinct name costs at most one
//! create call per run.
//!
//! Organization calls are single-shot. A failing step is recorded in the
//! [`OrganizationReport`] and announced as
//! [`TransferEvent::OrganizationFailed`]; the remaining steps still run.
//! Cancellation is checked between passes.

use crate::captions::{read_caption, tokenize_caption};
use crate::config::TransferConfiguration;
use crate::run::RunId;
use crate::upload::UploadResult;
use bridge_traits::error::BridgeError;
use bridge_traits::remote::RemoteGateway;
use core_async::sync::CancellationToken;
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Report Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationPass {
    NamedAlbum,
    DirectoryAlbums,
    NamedTag,
    DirectoryTags,
    CaptionDescriptions,
    CaptionTags,
}

impl OrganizationPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationPass::NamedAlbum => "named_album",
            OrganizationPass::DirectoryAlbums => "directory_albums",
            OrganizationPass::NamedTag => "named_tag",
            OrganizationPass::DirectoryTags => "directory_tags",
            OrganizationPass::CaptionDescriptions => "caption_descriptions",
            OrganizationPass::CaptionTags => "caption_tags",
        }
    }
}

impl fmt::Display for OrganizationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed organization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationFailure {
    pub pass: OrganizationPass,
    /// Album/tag name or asset id.
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationReport {
    /// Passes that ran to the end, in order.
    pub passes: Vec<OrganizationPass>,
    pub albums_created: Vec<String>,
    pub tags_created: Vec<String>,
    /// Asset memberships requested across all album calls.
    pub album_assignments: u64,
    /// Asset memberships requested across all tag calls.
    pub tag_assignments: u64,
    pub descriptions_updated: u64,
    pub failures: Vec<OrganizationFailure>,
    /// Stopped between passes by a cancel request.
    pub cancelled: bool,
}

impl OrganizationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Collection Snapshot
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionKind {
    Album,
    Tag,
}

impl CollectionKind {
    fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Album => "album",
            CollectionKind::Tag => "tag",
        }
    }
}

/// Lazily fetched `name -> id` listing, updated after each create.
#[derive(Debug, Default)]
struct CollectionSnapshot {
    entries: Option<HashMap<String, String>>,
}

// ============================================================================
// Engine
// ============================================================================

/// Applies the configured organization passes for one run.
///
/// Owns its snapshots; build a fresh engine per run.
pub struct OrganizationEngine {
    gateway: Arc<dyn RemoteGateway>,
    event_bus: EventBus,
    run_id: RunId,
    albums: CollectionSnapshot,
    tags: CollectionSnapshot,
    captions: HashMap<PathBuf, Option<String>>,
    report: OrganizationReport,
}

impl OrganizationEngine {
    pub fn new(gateway: Arc<dyn RemoteGateway>, event_bus: EventBus, run_id: RunId) -> Self {
        Self {
            gateway,
            event_bus,
            run_id,
            albums: CollectionSnapshot::default(),
            tags: CollectionSnapshot::default(),
            captions: HashMap::new(),
            report: OrganizationReport::default(),
        }
    }

    /// Runs every enabled pass over the successful `results`.
    ///
    /// Failed uploads are ignored. Never fails; problems end up in the
    /// returned report.
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub async fn apply(
        mut self,
        results: &[UploadResult],
        config: &TransferConfiguration,
        cancellation: &CancellationToken,
    ) -> OrganizationReport {
        let uploaded: Vec<&UploadResult> = results.iter().filter(|r| r.is_success()).collect();
        if uploaded.is_empty() {
            debug!("No uploaded assets to organize");
            return self.report;
        }

        let all_ids: Vec<String> = uploaded.iter().filter_map(|r| r.asset_id()).collect();
        info!(assets = all_ids.len(), "Organizing uploaded assets");

        // Passes 1-4: collections
        if let Some(name) = config.album_name() {
            if self.stop_requested(cancellation) {
                return self.report;
            }
            self.assign(CollectionKind::Album, OrganizationPass::NamedAlbum, name, &all_ids)
                .await;
            self.report.passes.push(OrganizationPass::NamedAlbum);
        }

        if config.directories_as_albums {
            if self.stop_requested(cancellation) {
                return self.report;
            }
            for (directory, ids) in group_by_directory(&uploaded) {
                self.assign(
                    CollectionKind::Album,
                    OrganizationPass::DirectoryAlbums,
                    &directory,
                    &ids,
                )
                .await;
            }
            self.report.passes.push(OrganizationPass::DirectoryAlbums);
        }

        if let Some(name) = config.tag_name() {
            if self.stop_requested(cancellation) {
                return self.report;
            }
            self.assign(CollectionKind::Tag, OrganizationPass::NamedTag, name, &all_ids)
                .await;
            self.report.passes.push(OrganizationPass::NamedTag);
        }

        if config.directories_as_tags {
            if self.stop_requested(cancellation) {
                return self.report;
            }
            for (directory, ids) in group_by_directory(&uploaded) {
                self.assign(
                    CollectionKind::Tag,
                    OrganizationPass::DirectoryTags,
                    &directory,
                    &ids,
                )
                .await;
            }
            self.report.passes.push(OrganizationPass::DirectoryTags);
        }

        // Passes 5-6: captions
        if config.import_captions {
            if self.stop_requested(cancellation) {
                return self.report;
            }
            self.import_descriptions(&uploaded).await;
            self.report.passes.push(OrganizationPass::CaptionDescriptions);
        }

        if config.captions_as_tags {
            if self.stop_requested(cancellation) {
                return self.report;
            }
            self.import_caption_tags(&uploaded, &config.caption_delimiters)
                .await;
            self.report.passes.push(OrganizationPass::CaptionTags);
        }

        info!(
            albums_created = self.report.albums_created.len(),
            tags_created = self.report.tags_created.len(),
            descriptions = self.report.descriptions_updated,
            failures = self.report.failures.len(),
            "Organization finished"
        );
        self.report
    }

    fn stop_requested(&mut self, cancellation: &CancellationToken) -> bool {
        if cancellation.is_cancelled() {
            info!("Organization stopped by cancel request");
            self.report.cancelled = true;
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    async fn assign(
        &mut self,
        kind: CollectionKind,
        pass: OrganizationPass,
        name: &str,
        asset_ids: &[String],
    ) {
        let id = match self.resolve_or_create(kind, name).await {
            Ok(id) => id,
            Err(e) => {
                self.record_failure(pass, name, &e);
                return;
            }
        };

        let result = match kind {
            CollectionKind::Album => self.gateway.add_assets_to_album(&id, asset_ids).await,
            CollectionKind::Tag => self.gateway.tag_assets(&id, asset_ids).await,
        };

        match result {
            Ok(()) => {
                debug!(kind = kind.as_str(), name, assets = asset_ids.len(), "Assets assigned");
                let count = asset_ids.len() as u64;
                match kind {
                    CollectionKind::Album => self.report.album_assignments += count,
                    CollectionKind::Tag => self.report.tag_assignments += count,
                }
            }
            Err(e) => self.record_failure(pass, name, &e),
        }
    }

    async fn resolve_or_create(
        &mut self,
        kind: CollectionKind,
        name: &str,
    ) -> Result<String, BridgeError> {
        if self.snapshot(kind).entries.is_none() {
            let listing = match kind {
                CollectionKind::Album => self.gateway.list_albums().await?,
                CollectionKind::Tag => self.gateway.list_tags().await?,
            };
            debug!(kind = kind.as_str(), count = listing.len(), "Fetched collection snapshot");
            self.snapshot(kind).entries = Some(listing);
        }

        if let Some(id) = self
            .snapshot(kind)
            .entries
            .as_ref()
            .and_then(|entries| entries.get(name))
        {
            return Ok(id.clone());
        }

        let id = match kind {
            CollectionKind::Album => self.gateway.create_album(name).await?,
            CollectionKind::Tag => self.gateway.create_tag(name).await?,
        };
        info!(kind = kind.as_str(), name, id = %id, "Created collection");

        self.snapshot(kind)
            .entries
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), id.clone());
        match kind {
            CollectionKind::Album => self.report.albums_created.push(name.to_string()),
            CollectionKind::Tag => self.report.tags_created.push(name.to_string()),
        }

        Ok(id)
    }

    fn snapshot(&mut self, kind: CollectionKind) -> &mut CollectionSnapshot {
        match kind {
            CollectionKind::Album => &mut self.albums,
            CollectionKind::Tag => &mut self.tags,
        }
    }

    // ------------------------------------------------------------------
    // Captions
    // ------------------------------------------------------------------

    async fn caption_for(&mut self, result: &UploadResult) -> Option<String> {
        if let Some(cached) = self.captions.get(&result.caption_path) {
            return cached.clone();
        }
        let caption = read_caption(&result.caption_path).await;
        self.captions
            .insert(result.caption_path.clone(), caption.clone());
        caption
    }

    async fn import_descriptions(&mut self, uploaded: &[&UploadResult]) {
        for result in uploaded {
            let Some(asset_id) = result.asset_id() else {
                continue;
            };
            let Some(caption) = self.caption_for(result).await else {
                continue;
            };

            match self.gateway.update_description(&asset_id, &caption).await {
                Ok(()) => self.report.descriptions_updated += 1,
                Err(e) => self.record_failure(OrganizationPass::CaptionDescriptions, &asset_id, &e),
            }
        }
    }

    async fn import_caption_tags(&mut self, uploaded: &[&UploadResult], delimiters: &str) {
        // Tag name -> assets, in first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut members: HashMap<String, Vec<String>> = HashMap::new();

        for result in uploaded {
            let Some(asset_id) = result.asset_id() else {
                continue;
            };
            let Some(caption) = self.caption_for(result).await else {
                continue;
            };

            for token in tokenize_caption(&caption, delimiters) {
                let entry = members.entry(token.clone()).or_insert_with(|| {
                    order.push(token.clone());
                    Vec::new()
                });
                entry.push(asset_id.clone());
            }
        }

        for tag in order {
            let ids = members.remove(&tag).unwrap_or_default();
            self.assign(CollectionKind::Tag, OrganizationPass::CaptionTags, &tag, &ids)
                .await;
        }
    }

    fn record_failure(&mut self, pass: OrganizationPass, subject: &str, error: &BridgeError) {
        warn!(pass = pass.as_str(), subject, error = %error, "Organization step failed");

        self.report.failures.push(OrganizationFailure {
            pass,
            subject: subject.to_string(),
            message: error.to_string(),
        });

        self.event_bus
            .emit(CoreEvent::Transfer(TransferEvent::OrganizationFailed {
                run_id: self.run_id.to_string(),
                pass: pass.as_str().to_string(),
                subject: subject.to_string(),
                message: error.to_string(),
            }))
            .ok();
    }
}

/// Successful uploads grouped by parent directory name, sorted by name.
/// Results without a directory name are left out.
fn group_by_directory(uploaded: &[&UploadResult]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for result in uploaded {
        if result.parent_directory.is_empty() {
            continue;
        }
        if let Some(id) = result.asset_id() {
            groups
                .entry(result.parent_directory.clone())
                .or_default()
                .push(id);
        }
    }
    groups
}
