//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AuthError, StorageError, StoreError};
use crate::live::ReportSubscription;
use crate::models::{NewReport, Principal, Report, ReportId, ReportPatch};

/// Persistence contract for the report collection.
///
/// Implementations assign `id`, `generated_at` (strictly increasing) and the
/// default status on `create`, enforce write access for `actor`, and publish
/// the new ordered list to live subscribers after every committed write.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, actor: &Principal, report: NewReport) -> Result<ReportId, StoreError>;

    /// Writes only the `Some` fields of `patch` and returns the updated report.
    async fn patch(&self, actor: &Principal, id: ReportId, patch: ReportPatch) -> Result<Report, StoreError>;

    async fn delete(&self, actor: &Principal, id: ReportId) -> Result<(), StoreError>;

    /// Live query ordered by `generated_at` descending.
    fn subscribe(&self) -> ReportSubscription;

    /// Namespaced collection path, e.g. `artifacts/{app}/public/data/error_reports`.
    fn collection_path(&self) -> String;
}

/// Byte-oriented object store keyed by path.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `path` with `content_type` as metadata and returns
    /// a publicly dereferenceable URL. All-or-nothing.
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError>;
}

/// A signed-in principal together with the token that proves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "userId")]
    pub principal: Principal,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity contract. Only anonymous sign-in is required by the desk.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Session, AuthError>;

    /// Resolves a session token back to its principal.
    fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}
