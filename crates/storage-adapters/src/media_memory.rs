//! Object storage held in a concurrent map. Used by tests and throwaway dev runs.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use domains::{ObjectStorage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

pub struct InMemoryMediaStore {
    objects: DashMap<String, StoredObject>,
    base_url: String,
    available: AtomicBool,
    refused_prefixes: DashSet<String>,
}

impl InMemoryMediaStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            available: AtomicBool::new(true),
            refused_prefixes: DashSet::new(),
        }
    }

    /// Simulates a storage outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Simulates a partial outage: writes under `prefix` fail, everything else succeeds.
    pub fn refuse_under(&self, prefix: impl Into<String>) {
        self.refused_prefixes.insert(prefix.into());
    }

    pub fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.get(path).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new("memory://media")
    }
}

#[async_trait]
impl ObjectStorage for InMemoryMediaStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        let refused = self.refused_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()));
        if refused || !self.available.load(Ordering::Acquire) {
            return Err(StorageError {
                path: path.to_string(),
                reason: "object storage is unavailable".into(),
            });
        }
        self.objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{path}", self.base_url))
    }
}
