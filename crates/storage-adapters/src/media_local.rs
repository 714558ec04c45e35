//! # Local Media Store
//!
//! Filesystem implementation of `ObjectStorage`. Objects live under
//! `root/{path}`; the declared content type is kept in a `{path}.meta.json`
//! sidecar next to the bytes. URLs are `{public_base_url}/{path}`, which the
//! HTTP layer serves from the same root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use domains::{ObjectStorage, StorageError};
use serde::{Deserialize, Serialize};
use tokio::fs;

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub content_type: String,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
}

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g. "./data/media")
    root: PathBuf,
    /// Public URL prefix (e.g. "/media")
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads back the sidecar written by `put`.
    pub async fn metadata(&self, path: &str) -> Result<ObjectMetadata, StorageError> {
        let target = self.resolve(path)?;
        let raw = fs::read(sidecar_for(&target)).await.map_err(|e| failure(path, e))?;
        serde_json::from_slice(&raw).map_err(|e| failure(path, e))
    }

    /// Rejects keys that would escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError {
                path: path.to_string(),
                reason: "object key must be a relative path without '..'".into(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn sidecar_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn failure(path: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ObjectStorage for LocalMediaStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| failure(path, e))?;
        }

        let meta = ObjectMetadata {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            stored_at: Utc::now(),
        };
        let meta = serde_json::to_vec_pretty(&meta).map_err(|e| failure(path, e))?;

        // Bytes land under a temp name first so a half-written object is never visible.
        let staging = target.with_extension("partial");
        fs::write(&staging, &bytes).await.map_err(|e| failure(path, e))?;
        fs::write(sidecar_for(&target), meta).await.map_err(|e| failure(path, e))?;
        fs::rename(&staging, &target).await.map_err(|e| failure(path, e))?;

        tracing::debug!(path, size = bytes.len(), content_type, "object written to disk");
        Ok(format!("{}/{path}", self.public_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_writes_bytes_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media/");

        let url = store
            .put("error_reports/midia/17_clip.mp4", Bytes::from_static(b"mp4"), "video/mp4")
            .await
            .unwrap();
        assert_eq!(url, "/media/error_reports/midia/17_clip.mp4");

        let on_disk = std::fs::read(dir.path().join("error_reports/midia/17_clip.mp4")).unwrap();
        assert_eq!(on_disk, b"mp4");
        let meta = store.metadata("error_reports/midia/17_clip.mp4").await.unwrap();
        assert_eq!(meta.content_type, "video/mp4");
        assert_eq!(meta.size, 3);
    }

    #[tokio::test]
    async fn traversal_keys_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media");
        let err = store
            .put("../outside.zip", Bytes::from_static(b"z"), "application/zip")
            .await
            .unwrap_err();
        assert_eq!(err.path, "../outside.zip");
        assert!(store.put("/abs.zip", Bytes::new(), "application/zip").await.is_err());
    }
}
