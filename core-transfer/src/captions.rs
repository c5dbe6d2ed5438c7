//! Caption sidecars.
//!
//! A caption is the text of a `.txt` file sharing the media file's stem.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Splits `text` on every character of `delimiters`.
///
/// Tokens are trimmed; empty tokens and repeats are dropped, first
/// occurrence order is kept. With no delimiters the whole trimmed text is a
/// single token.
///
/// # Example
///
/// ```rust
/// use core_transfer::captions::tokenize_caption;
///
/// assert_eq!(
///     tokenize_caption("sunset, beach|ocean", ",|"),
///     vec!["sunset", "beach", "ocean"]
/// );
/// ```
pub fn tokenize_caption(text: &str, delimiters: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let separators: Vec<char> = delimiters.chars().collect();

    let pieces: Box<dyn Iterator<Item = &str>> = if separators.is_empty() {
        Box::new(std::iter::once(text))
    } else {
        Box::new(text.split(separators.as_slice()))
    };

    pieces
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| seen.insert(token.to_string()))
        .map(str::to_string)
        .collect()
}

/// Reads a caption file. Missing or unreadable files yield `None`; blank
/// captions too.
pub async fn read_caption(path: &Path) -> Option<String> {
    match core_async::fs::read_to_string(path).await {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No caption file");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read caption file");
            None
        }
    }
}
