use std::sync::Arc;

use domains::IdentityProvider;
use services::{DiagnosticsBus, ReportService};

use crate::metrics::Metrics;

/// Shared application state available to all handlers via axum's `State` extractor.
///
/// Cloned per request, so everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub diagnostics: Arc<DiagnosticsBus>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(reports: Arc<ReportService>, identity: Arc<dyn IdentityProvider>, metrics: Arc<Metrics>) -> Self {
        let diagnostics = Arc::clone(reports.classifier().bus());
        Self {
            reports,
            identity,
            diagnostics,
            metrics,
        }
    }
}
