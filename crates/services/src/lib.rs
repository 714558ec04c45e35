//! Application services for the report desk.
//!
//! Everything here talks to the outside world only through the ports in
//! `domains`; adapters are injected by the binary.

pub mod diagnostics;
pub mod lifecycle;
pub mod optimistic;
pub mod uploads;
pub mod validation;

pub use diagnostics::{
    run_diagnostics_logger, ClassifiedError, DiagnosticsBus, ErrorClassifier, OperationContext, PermissionDeniedEvent,
};
pub use lifecycle::{ReportService, SubmissionProgress, SubmissionState};
pub use optimistic::{AffordanceError, AffordanceState, StatusAffordance};
pub use uploads::{AttachmentUploader, STORAGE_ROOT};
pub use validation::{ReportValidator, ValidatedArchive, ValidatedReport};
