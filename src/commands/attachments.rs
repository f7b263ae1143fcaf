//! Local files as message attachments
//!
//! Files are inlined as base64 `data:` URIs so the backend needs no separate
//! upload step.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::conversation::Attachment;
use crate::error::{CoachlineError, Result};

/// Largest file accepted as an attachment (10 MiB)
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Guesses a MIME type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Reads `path` into a `data:` URI attachment
///
/// # Errors
///
/// Returns an error if the file cannot be read or exceeds
/// [`MAX_ATTACHMENT_BYTES`].
pub fn load_attachment(path: &Path) -> Result<Attachment> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_ATTACHMENT_BYTES {
        return Err(CoachlineError::Config(format!(
            "Attachment {} is {} bytes; the limit is {} bytes",
            path.display(),
            size,
            MAX_ATTACHMENT_BYTES
        ))
        .into());
    }

    let bytes = std::fs::read(path)?;
    let content_type = content_type_for(path);
    tracing::debug!(path = %path.display(), size, content_type, "Loaded attachment");
    Ok(Attachment::new(format!(
        "data:{};base64,{}",
        content_type,
        STANDARD.encode(bytes)
    ))
    .with_content_type(content_type))
}

/// Loads every path, stopping at the first failure
///
/// # Errors
///
/// Returns the first load error.
pub fn load_attachments(paths: &[impl AsRef<Path>]) -> Result<Vec<Attachment>> {
    paths.iter().map(|p| load_attachment(p.as_ref())).collect()
}
