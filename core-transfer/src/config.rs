//! Per-run options.
//!
//! Both configurations are captured once when a run starts and never change
//! while it executes.

use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for one upload run.
///
/// # Example
///
/// ```rust
/// use core_transfer::TransferConfiguration;
///
/// let config = TransferConfiguration::default()
///     .with_recursive(true)
///     .with_album_name("Holiday 2024")
///     .with_directories_as_tags(true)
///     .with_captions_as_tags(",|");
///
/// assert_eq!(config.album_name(), Some("Holiday 2024"));
/// assert!(config.captions_as_tags);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfiguration {
    /// Include nested directory contents.
    pub recursive: bool,
    /// One album receiving every successful upload.
    pub album_name: Option<String>,
    /// One tag attached to every successful upload.
    pub tag_name: Option<String>,
    /// One album per source parent directory.
    pub directories_as_albums: bool,
    /// One tag per source parent directory.
    pub directories_as_tags: bool,
    /// Push sibling `.txt` contents as the asset description.
    pub import_captions: bool,
    /// Split sibling `.txt` contents into tags.
    pub captions_as_tags: bool,
    /// Literal characters that separate caption tokens.
    pub caption_delimiters: String,
}

impl TransferConfiguration {
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_album_name(mut self, name: impl Into<String>) -> Self {
        self.album_name = Some(name.into());
        self
    }

    pub fn with_tag_name(mut self, name: impl Into<String>) -> Self {
        self.tag_name = Some(name.into());
        self
    }

    pub fn with_directories_as_albums(mut self, enabled: bool) -> Self {
        self.directories_as_albums = enabled;
        self
    }

    pub fn with_directories_as_tags(mut self, enabled: bool) -> Self {
        self.directories_as_tags = enabled;
        self
    }

    pub fn with_import_captions(mut self, enabled: bool) -> Self {
        self.import_captions = enabled;
        self
    }

    /// Enables caption tags, split on any character of `delimiters`.
    pub fn with_captions_as_tags(mut self, delimiters: impl Into<String>) -> Self {
        self.captions_as_tags = true;
        self.caption_delimiters = delimiters.into();
        self
    }

    /// Named album, `None` when unset or blank.
    pub fn album_name(&self) -> Option<&str> {
        non_blank(self.album_name.as_deref())
    }

    /// Named tag, `None` when unset or blank.
    pub fn tag_name(&self) -> Option<&str> {
        non_blank(self.tag_name.as_deref())
    }

    /// Whether any organization pass would run.
    pub fn has_organization(&self) -> bool {
        self.album_name().is_some()
            || self.tag_name().is_some()
            || self.directories_as_albums
            || self.directories_as_tags
            || self.import_captions
            || self.captions_as_tags
    }

    /// Whether sibling caption files need to be read.
    pub fn reads_captions(&self) -> bool {
        self.import_captions || self.captions_as_tags
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Options for one download run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfiguration {
    /// Root directory receiving one sub-directory per pack.
    pub save_path: Option<PathBuf>,
    /// Write the asset description into the sidecar.
    pub export_descriptions: bool,
    /// Write the asset tags into the sidecar.
    pub export_tags: bool,
    /// Separator placed between exported tags.
    pub caption_delimiter: String,
}

impl Default for DownloadConfiguration {
    fn default() -> Self {
        Self {
            save_path: None,
            export_descriptions: false,
            export_tags: false,
            caption_delimiter: ", ".to_string(),
        }
    }
}

impl DownloadConfiguration {
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn with_export_descriptions(mut self, enabled: bool) -> Self {
        self.export_descriptions = enabled;
        self
    }

    pub fn with_export_tags(mut self, enabled: bool) -> Self {
        self.export_tags = enabled;
        self
    }

    pub fn with_caption_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.caption_delimiter = delimiter.into();
        self
    }

    /// Whether a `.txt` sidecar is written next to each asset.
    pub fn writes_sidecar(&self) -> bool {
        self.export_descriptions || self.export_tags
    }

    /// Returns the save path or a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Configuration`] when no path was selected.
    pub fn require_save_path(&self) -> Result<&PathBuf> {
        self.save_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| TransferError::Configuration("no save path selected".to_string()))
    }
}
