//! Shared fixtures for the cross-crate scenario tests.

use std::sync::Arc;

use domains::{AccessPolicy, AttachmentPolicy, FileUpload, ObjectStorage, Principal, ReportRepository, ReportSubmission};
use services::{DiagnosticsBus, ErrorClassifier, ReportService};
use storage_adapters::{InMemoryMediaStore, InMemoryReportRepository};

#[cfg(feature = "web-axum")]
use api_adapters::{build_router, count_permission_denials, AppState, HttpConfig, Metrics};

pub const APP_ID: &str = "scenario-app";

/// A fully wired in-memory desk.
pub struct Desk {
    pub service: Arc<ReportService>,
    pub repo: Arc<InMemoryReportRepository>,
    pub media: Arc<InMemoryMediaStore>,
    pub bus: Arc<DiagnosticsBus>,
}

impl Desk {
    pub fn new(access: AccessPolicy) -> Self {
        Self::with_policy(access, AttachmentPolicy::default())
    }

    pub fn with_policy(access: AccessPolicy, policy: AttachmentPolicy) -> Self {
        let repo = Arc::new(InMemoryReportRepository::new(APP_ID, access));
        let media = Arc::new(InMemoryMediaStore::new("https://files.test"));
        let bus = Arc::new(DiagnosticsBus::default());
        let service = ReportService::new(
            Arc::clone(&repo) as Arc<dyn ReportRepository>,
            Arc::clone(&media) as Arc<dyn ObjectStorage>,
            policy,
            ErrorClassifier::new(Arc::clone(&bus)),
        );
        Self {
            service: Arc::new(service),
            repo,
            media,
            bus,
        }
    }

    /// The desk behind the HTTP router with anonymous sign-in and denial
    /// accounting. Spawns the counter task, so call it inside a Tokio runtime.
    #[cfg(feature = "web-axum")]
    pub fn router(&self) -> (axum::Router, Arc<Metrics>) {
        let identity = auth_adapters::AnonymousAuthProvider::new(
            &secrecy::SecretString::from("scenario-secret-0123456789".to_string()),
            chrono::Duration::minutes(5),
        );
        let metrics = Arc::new(Metrics::new());
        tokio::spawn(count_permission_denials(Arc::clone(&metrics), self.bus.subscribe()));
        let state = AppState::new(
            Arc::clone(&self.service),
            Arc::new(identity) as Arc<dyn domains::IdentityProvider>,
            Arc::clone(&metrics),
        );
        (build_router(state, &HttpConfig::default()), metrics)
    }
}

pub fn anon(id: &str) -> Principal {
    Principal::new(id)
}

pub fn submission(client: &str) -> ReportSubmission {
    ReportSubmission {
        client_name: Some(client.into()),
        technician_name: Some("Jo".into()),
        error_date: Some("2024-01-05".into()),
        report_text: Some("disk full".into()),
        ..Default::default()
    }
}

pub fn file(name: &str, content_type: &str, size: usize) -> FileUpload {
    FileUpload::new(name, content_type, vec![7u8; size])
}
