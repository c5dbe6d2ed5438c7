//! # File Discovery
//!
//! Resolves the user's selected sources into the ordered list of media files
//! a run will upload.
//!
//! ## Rules
//!
//! - A source that is a file is included directly, subject to the extension
//!   filter.
//! - A directory contributes its immediate files, or every descendant file
//!   when `recursive` is set. Symlinked files are included; symlinked
//!   directories are not descended into.
//! - Extension matching is case-insensitive against the configured allow-list.
//! - Files under one source are sorted by path; sources keep their selection
//!   order. Duplicated sources yield duplicated candidates.
//! - Sources that no longer exist are skipped with a warning. Unreadable
//!   nested entries are skipped too; only an unreadable source root fails.
//!
//! Discovery only reads the filesystem. It is synchronous and intended to run
//! on a blocking thread.

use crate::error::{Result, TransferError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A media file eligible for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// Name of the immediate parent directory; groups per-directory albums
    /// and tags.
    pub parent_directory: String,
    /// Sibling caption file: same stem, `.txt` extension.
    pub caption_path: PathBuf,
}

impl CandidateFile {
    pub fn new(path: PathBuf) -> Self {
        let parent_directory = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let caption_path = path.with_extension("txt");

        Self {
            path,
            parent_directory,
            caption_path,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Whether `path` ends in one of `extensions` (lowercase, leading dot).
pub fn is_media_file(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let suffix = format!(".{}", ext.to_string_lossy().to_lowercase());
    extensions.iter().any(|allowed| *allowed == suffix)
}

/// Expand `sources` into candidate files.
///
/// # Errors
///
/// Returns [`TransferError::Discovery`] when a source directory itself cannot
/// be listed.
pub fn discover(
    sources: &[PathBuf],
    recursive: bool,
    extensions: &[String],
) -> Result<Vec<CandidateFile>> {
    let mut candidates = Vec::new();

    for source in sources {
        if source.is_file() {
            if is_media_file(source, extensions) {
                candidates.push(CandidateFile::new(source.clone()));
            } else {
                debug!(path = %source.display(), "Skipping non-media file");
            }
        } else if source.is_dir() {
            let mut files = list_directory(source, recursive)?;
            files.retain(|path| is_media_file(path, extensions));
            files.sort();
            candidates.extend(files.into_iter().map(CandidateFile::new));
        } else {
            warn!(path = %source.display(), "Source path does not exist; skipping");
        }
    }

    debug!(count = candidates.len(), recursive, "Discovery finished");
    Ok(candidates)
}

fn list_directory(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(root).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                // Resolves symlinks; the walk itself does not follow them.
                if entry.path().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(e) if e.depth() == 0 => {
                return Err(TransferError::Discovery {
                    path: root.to_path_buf(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
            }
        }
    }

    Ok(files)
}
