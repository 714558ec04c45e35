//! # Errors
//!
//! Centralized error handling for the report desk.
//! Port errors (`StoreError`, `StorageError`, `AuthError`) are what adapters
//! return; `DomainError` is what the services hand to their callers.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::models::ReportId;

/// Why a single field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    RequiredFieldMissing,
    FileTooLarge,
    UnsupportedMediaType,
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub kind: ViolationKind,
    pub message: String,
}

/// Field name → ordered violations. Empty means the payload passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<FieldViolation>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, kind: ViolationKind, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(FieldViolation {
            kind,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[FieldViolation]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn has(&self, field: &str, kind: ViolationKind) -> bool {
        self.get(field).is_some_and(|v| v.iter().any(|x| x.kind == kind))
    }

    /// Messages only, in the shape form clients render (`{ field: [msg, ..] }`).
    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().map(|x| x.message.clone()).collect()))
            .collect()
    }
}

/// Failure reported by a `ReportRepository` adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("report {0} not found")]
    NotFound(ReportId),

    /// The acting principal lacks write capability on the collection.
    #[error("missing or insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Backend unreachable, I/O failure, corrupt row, ...
    #[error("{0}")]
    Unavailable(String),
}

/// Failure reported by an `ObjectStorage` adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("object storage write failed for '{path}': {reason}")]
pub struct StorageError {
    pub path: String,
    pub reason: String,
}

/// Failure reported by the identity collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid or expired session token")]
    InvalidToken,

    #[error("sign-in failed: {0}")]
    SignInFailed(String),
}

/// The primary error type returned by service operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No principal yet; submission is blocked until sign-in completes.
    #[error("not authenticated: sign-in has not completed")]
    NotAuthenticated,

    /// Field-level violations, recoverable in place.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("attachment upload failed: {0}")]
    UploadFailed(String),

    /// Backend write failure; the message is surfaced verbatim.
    #[error("{0}")]
    Persistence(String),

    #[error("report {0} not found")]
    NotFound(ReportId),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The caller already has a change to this report awaiting confirmation.
    #[error("a change to report {0} is already in flight")]
    InFlight(ReportId),

    /// The progress tracker handed in is still following an earlier attempt.
    #[error("a submission is already in flight")]
    SubmissionInFlight,
}

/// A specialized Result type for report desk logic.
pub type Result<T> = std::result::Result<T, DomainError>;
