//! # Attachment Uploads
//!
//! Moves attachment bytes into object storage and hands back the retrieval
//! URL that goes onto the report.

use std::sync::Arc;

use domains::{DomainError, FileUpload, MonotonicClock, ObjectStorage};

/// Top-level prefix under which every attachment is stored.
pub const STORAGE_ROOT: &str = "error_reports";

pub struct AttachmentUploader {
    storage: Arc<dyn ObjectStorage>,
    clock: MonotonicClock,
}

impl AttachmentUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            storage,
            clock: MonotonicClock::new(),
        }
    }

    /// Uploads `file` into `folder`.
    ///
    /// `Ok(None)` is the "no attachment" answer for an absent or empty file and
    /// performs no I/O. Any storage failure is an `UploadFailed`.
    #[tracing::instrument(skip(self, file), fields(file_name, size))]
    pub async fn upload(&self, file: Option<&FileUpload>, folder: &str) -> Result<Option<String>, DomainError> {
        let Some(file) = file.filter(|f| !f.is_empty()) else {
            return Ok(None);
        };
        let span = tracing::Span::current();
        span.record("file_name", file.file_name.as_str());
        span.record("size", file.size());

        let key = self.storage_key(&file.file_name, folder);
        match self.storage.put(&key, file.bytes.clone(), &file.content_type).await {
            Ok(url) => {
                tracing::debug!(%key, %url, "attachment stored");
                Ok(Some(url))
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "attachment upload failed");
                Err(DomainError::UploadFailed(err.to_string()))
            }
        }
    }

    /// `error_reports/{folder}/{millis}_{file name}`; the millisecond stamp is
    /// unique per uploader, so two uploads never share a key.
    pub fn storage_key(&self, file_name: &str, folder: &str) -> String {
        format!(
            "{STORAGE_ROOT}/{}/{}_{}",
            sanitize_segment(folder, "misc"),
            self.clock.now_millis(),
            sanitize_segment(file_name, "upload"),
        )
    }
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_segment(raw: &str, fallback: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}
