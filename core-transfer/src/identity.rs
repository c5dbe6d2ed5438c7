//! Asset identity.
//!
//! The server deduplicates uploads on a client-chosen identifier. It is
//! derived from file name, size and modification time, so re-uploading an
//! unchanged file always produces the same id.

use crate::discovery::CandidateFile;
use crate::error::Result;
use bridge_traits::remote::UploadRequest;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// SHA-256 hex digest of `"{file_name}_{size}_{modified_secs}"`.
pub fn device_asset_id(file_name: &str, size: u64, modified_secs: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}_{}", file_name, size, modified_secs).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stats the candidate and builds the request the gateway uploads.
///
/// The creation time falls back to the modification time on filesystems
/// that do not record it. A missing modification time reads as the Unix
/// epoch so the id stays stable.
///
/// # Errors
///
/// Returns [`TransferError::Io`](crate::TransferError::Io) when the file
/// cannot be stat'ed.
pub async fn upload_request(candidate: &CandidateFile, device_id: &str) -> Result<UploadRequest> {
    let metadata = core_async::fs::metadata(&candidate.path).await?;

    let modified = modified_or_epoch(metadata.modified());
    let created = metadata.created().map(to_utc).unwrap_or(modified);

    Ok(UploadRequest {
        file_path: candidate.path.clone(),
        device_asset_id: device_asset_id(
            &candidate.file_name(),
            metadata.len(),
            modified.timestamp(),
        ),
        device_id: device_id.to_string(),
        file_created_at: created,
        file_modified_at: modified,
    })
}

fn modified_or_epoch(modified: std::io::Result<SystemTime>) -> DateTime<Utc> {
    to_utc(modified.unwrap_or(UNIX_EPOCH))
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
