//! # Report Lifecycle
//!
//! Orchestrates creation (validate → upload → persist) and the single-step
//! mutations on committed reports (status toggle, edit, delete).
//!
//! Each submission moves through [`SubmissionState`]; the legal edges are
//! encoded in [`SubmissionState::can_advance_to`] and progress is published
//! on a watch channel so a form can stay disabled while a submission is in
//! flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domains::{
    ArchiveRecord, DomainError, NewReport, ObjectStorage, OperationKind, Principal, Report, ReportEdit, ReportId,
    ReportPatch, ReportRepository, ReportStatus, ReportSubmission, ReportSubscription, Result, StoreError,
    AttachmentPolicy, ARCHIVE_FOLDER, MEDIA_FOLDER,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::diagnostics::{ErrorClassifier, OperationContext};
use crate::optimistic::StatusAffordance;
use crate::uploads::AttachmentUploader;
use crate::validation::{ReportValidator, ValidatedArchive};

// ---------------------------------------------------------------------------
// Submission state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SubmissionState {
    Draft,
    Uploading,
    Persisting,
    Committed {
        #[serde(rename = "reportId")]
        report_id: ReportId,
    },
    Failed {
        reason: String,
    },
}

impl SubmissionState {
    pub fn can_advance_to(&self, next: &SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Draft, Uploading)
                | (Draft, Failed { .. })
                | (Uploading, Persisting)
                | (Uploading, Failed { .. })
                | (Persisting, Committed { .. })
                | (Persisting, Failed { .. })
        )
    }

    /// True while resubmission must stay disabled.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Uploading | Self::Persisting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::Failed { .. })
    }
}

/// Publishes a submission's state to whoever holds the receiver.
pub struct SubmissionProgress {
    sender: watch::Sender<SubmissionState>,
}

impl SubmissionProgress {
    pub fn new() -> (Self, watch::Receiver<SubmissionState>) {
        let (sender, receiver) = watch::channel(SubmissionState::Draft);
        (Self { sender }, receiver)
    }

    pub fn current(&self) -> SubmissionState {
        self.sender.borrow().clone()
    }

    /// Returns a finished tracker to `Draft` so it can follow another attempt.
    /// Refused (returns `false`) while an attempt is uploading or persisting.
    pub fn reset(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if state.is_terminal() {
                *state = SubmissionState::Draft;
                true
            } else {
                false
            }
        });
        self.current() == SubmissionState::Draft
    }

    fn advance(&self, next: SubmissionState) {
        let current = self.current();
        if !current.can_advance_to(&next) {
            tracing::warn!(?current, ?next, "illegal submission transition ignored");
            return;
        }
        self.sender.send_replace(next);
    }
}

// ---------------------------------------------------------------------------
// ReportService
// ---------------------------------------------------------------------------

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
    uploader: AttachmentUploader,
    validator: ReportValidator,
    classifier: ErrorClassifier,
    stage_timeout: Option<Duration>,
}

impl ReportService {
    pub fn new(
        repo: Arc<dyn ReportRepository>,
        storage: Arc<dyn ObjectStorage>,
        policy: AttachmentPolicy,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            repo,
            uploader: AttachmentUploader::new(storage),
            validator: ReportValidator::new(policy),
            classifier,
            stage_timeout: None,
        }
    }

    /// Bounds each upload and the final write; a stalled stage fails instead of hanging.
    pub fn with_stage_timeout(mut self, limit: Duration) -> Self {
        self.stage_timeout = Some(limit);
        self
    }

    pub fn validator(&self) -> &ReportValidator {
        &self.validator
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn subscribe(&self) -> ReportSubscription {
        self.repo.subscribe()
    }

    pub fn collection_path(&self) -> String {
        self.repo.collection_path()
    }

    pub async fn submit(&self, principal: Option<&Principal>, input: ReportSubmission) -> Result<ReportId> {
        let (progress, _) = SubmissionProgress::new();
        self.submit_with_progress(principal, input, &progress).await
    }

    /// Runs one submission end to end.
    ///
    /// Validation failures and a missing principal leave the submission in
    /// `Draft`; upload and write failures move it to `Failed` and never leave a
    /// document referencing an object that was not stored.
    #[tracing::instrument(skip_all, fields(principal = principal.map(Principal::as_str)))]
    pub async fn submit_with_progress(
        &self,
        principal: Option<&Principal>,
        input: ReportSubmission,
        progress: &SubmissionProgress,
    ) -> Result<ReportId> {
        let Some(principal) = principal else {
            return Err(DomainError::NotAuthenticated);
        };
        if !progress.reset() {
            return Err(DomainError::SubmissionInFlight);
        }
        let validated = self.validator.validate(&input).map_err(|errors| {
            tracing::info!(fields = ?errors.fields().collect::<Vec<_>>(), "submission rejected by validation");
            DomainError::Validation(errors)
        })?;

        progress.advance(SubmissionState::Uploading);
        let media = self.bounded(self.uploader.upload(validated.media_file.as_ref(), MEDIA_FOLDER), |limit| {
            DomainError::UploadFailed(format!("media upload timed out after {}s", limit.as_secs()))
        });
        let archive = self.bounded(
            async {
                match &validated.archive {
                    ValidatedArchive::File(file) => self.uploader.upload(file.as_ref(), ARCHIVE_FOLDER).await,
                    ValidatedArchive::Attestation(_) => Ok(None),
                }
            },
            |limit| DomainError::UploadFailed(format!("archive upload timed out after {}s", limit.as_secs())),
        );
        let (media_url, zip_url) = match tokio::try_join!(media, archive) {
            Ok(urls) => urls,
            Err(err) => {
                progress.advance(SubmissionState::Failed { reason: err.to_string() });
                return Err(err);
            }
        };

        progress.advance(SubmissionState::Persisting);
        let new_report = NewReport {
            client_name: validated.client_name,
            technician_name: validated.technician_name,
            error_date: validated.error_date,
            report_text: validated.report_text,
            media_url,
            archive: match validated.archive {
                ValidatedArchive::File(_) => ArchiveRecord::ZipUrl(zip_url),
                ValidatedArchive::Attestation(answer) => ArchiveRecord::DatabaseSavedOnPc(answer),
            },
            reported_by_user_id: principal.to_string(),
        };
        let attempted = serde_json::to_value(&new_report).unwrap_or_default();

        let written = self
            .bounded(self.repo.create(principal, new_report), |limit| {
                StoreError::Unavailable(format!("report write timed out after {}s", limit.as_secs()))
            })
            .await;
        match written {
            Ok(id) => {
                tracing::info!(report_id = %id, "report committed");
                progress.advance(SubmissionState::Committed { report_id: id });
                Ok(id)
            }
            Err(failure) => {
                let ctx = OperationContext::new(self.repo.collection_path(), OperationKind::Create, principal)
                    .with_data(attempted);
                let err = DomainError::from(self.classifier.classify(failure, ctx));
                tracing::error!(error = %err, "report write failed");
                progress.advance(SubmissionState::Failed { reason: err.to_string() });
                Err(err)
            }
        }
    }

    /// Flips `current` (the status the viewer sees) and writes the result.
    pub async fn toggle_status(&self, actor: &Principal, id: ReportId, current: ReportStatus) -> Result<ReportStatus> {
        self.set_status(actor, id, current.toggled()).await.map(|r| r.status)
    }

    /// Toggle driven through an optimistic affordance: confirmed on success,
    /// rolled back on any failure.
    pub async fn toggle_with_affordance(
        &self,
        actor: &Principal,
        id: ReportId,
        affordance: &mut StatusAffordance,
    ) -> Result<ReportStatus> {
        let requested = affordance.begin_toggle().map_err(|_| DomainError::InFlight(id))?;
        match self.set_status(actor, id, requested).await {
            Ok(report) => {
                let _ = affordance.confirm();
                Ok(report.status)
            }
            Err(err) => {
                let _ = affordance.rollback();
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn set_status(&self, actor: &Principal, id: ReportId, status: ReportStatus) -> Result<Report> {
        self.patch(actor, id, ReportPatch::status(status)).await
    }

    #[tracing::instrument(skip(self, actor, edit), fields(actor = %actor))]
    pub async fn edit(&self, actor: &Principal, id: ReportId, edit: &ReportEdit) -> Result<Report> {
        let patch = self.validator.validate_edit(edit).map_err(DomainError::Validation)?;
        self.patch(actor, id, patch).await
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn delete(&self, actor: &Principal, id: ReportId) -> Result<()> {
        self.repo.delete(actor, id).await.map_err(|failure| {
            let ctx = OperationContext::new(self.document_path(id), OperationKind::Delete, actor);
            DomainError::from(self.classifier.classify(failure, ctx))
        })?;
        tracing::info!(report_id = %id, "report deleted");
        Ok(())
    }

    async fn patch(&self, actor: &Principal, id: ReportId, patch: ReportPatch) -> Result<Report> {
        let attempted = patch.to_json();
        self.repo.patch(actor, id, patch).await.map_err(|failure| {
            let ctx = OperationContext::new(self.document_path(id), OperationKind::Update, actor).with_data(attempted);
            DomainError::from(self.classifier.classify(failure, ctx))
        })
    }

    fn document_path(&self, id: ReportId) -> String {
        format!("{}/{id}", self.repo.collection_path())
    }

    async fn bounded<T, E, F>(&self, fut: F, on_timeout: impl FnOnce(Duration) -> E) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
    {
        match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(on_timeout(limit)),
            },
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsBus;
    use chrono::{NaiveDate, Utc};
    use domains::{
        FileUpload, LiveQueryHub, MockObjectStorage, MockReportRepository, StorageError, ViolationKind,
    };
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    const PATH: &str = "artifacts/test-app/public/data/error_reports";

    fn acme() -> ReportSubmission {
        ReportSubmission {
            client_name: Some("Acme".into()),
            technician_name: Some("Jo".into()),
            error_date: Some("2024-01-05".into()),
            report_text: Some("disk full".into()),
            ..Default::default()
        }
    }

    fn committed(id: ReportId, status: ReportStatus) -> Report {
        let mut report = NewReport {
            client_name: "Acme".into(),
            technician_name: "Jo".into(),
            error_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            report_text: "disk full".into(),
            media_url: None,
            archive: ArchiveRecord::ZipUrl(None),
            reported_by_user_id: "anon-1".into(),
        }
        .into_report(id, Utc::now());
        report.status = status;
        report
    }

    fn repo_with_path() -> MockReportRepository {
        let mut repo = MockReportRepository::new();
        repo.expect_collection_path().returning(|| PATH.to_string());
        repo
    }

    fn service(repo: MockReportRepository, storage: MockObjectStorage) -> (ReportService, Arc<DiagnosticsBus>) {
        let bus = Arc::new(DiagnosticsBus::default());
        let svc = ReportService::new(
            Arc::new(repo),
            Arc::new(storage),
            AttachmentPolicy::default(),
            ErrorClassifier::new(Arc::clone(&bus)),
        );
        (svc, bus)
    }

    #[tokio::test]
    async fn acme_submission_commits_without_attachments() {
        let id = Uuid::now_v7();
        let mut repo = repo_with_path();
        repo.expect_create()
            .withf(|actor, report| {
                actor.as_str() == "anon-1"
                    && report.client_name == "Acme"
                    && report.media_url.is_none()
                    && report.archive == ArchiveRecord::ZipUrl(None)
                    && report.reported_by_user_id == "anon-1"
            })
            .times(1)
            .returning(move |_, _| Ok(id));
        let mut storage = MockObjectStorage::new();
        storage.expect_put().never();
        let (svc, _) = service(repo, storage);

        let (progress, rx) = SubmissionProgress::new();
        let who = Principal::new("anon-1");
        let got = svc.submit_with_progress(Some(&who), acme(), &progress).await;
        assert_eq!(assert_ok!(got), id);
        assert_eq!(*rx.borrow(), SubmissionState::Committed { report_id: id });
    }

    #[tokio::test]
    async fn missing_principal_blocks_before_anything_runs() {
        let mut repo = repo_with_path();
        repo.expect_create().never();
        let (svc, _) = service(repo, MockObjectStorage::new());

        let err = assert_err!(svc.submit(None, acme()).await);
        assert_eq!(err, DomainError::NotAuthenticated);
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_the_store() {
        let mut repo = repo_with_path();
        repo.expect_create().never();
        let (svc, _) = service(repo, MockObjectStorage::new());

        let mut input = acme();
        input.client_name = None;
        input.report_text = Some("  ".into());
        let (progress, rx) = SubmissionProgress::new();
        let who = Principal::new("anon-1");
        let err = svc.submit_with_progress(Some(&who), input, &progress).await.unwrap_err();

        let DomainError::Validation(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["clientName", "reportText"]);
        assert!(errors.has("reportText", ViolationKind::RequiredFieldMissing));
        assert_eq!(*rx.borrow(), SubmissionState::Draft);
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_create() {
        let mut repo = repo_with_path();
        repo.expect_create().never();
        let mut storage = MockObjectStorage::new();
        storage.expect_put().returning(|path, _, _| {
            Err(StorageError {
                path: path.to_string(),
                reason: "simulated outage".into(),
            })
        });
        let (svc, _) = service(repo, storage);

        let mut input = acme();
        input.media_file = Some(FileUpload::new("shot.png", "image/png", vec![1, 2, 3]));
        let (progress, rx) = SubmissionProgress::new();
        let who = Principal::new("anon-1");
        let err = svc.submit_with_progress(Some(&who), input, &progress).await.unwrap_err();

        assert!(matches!(err, DomainError::UploadFailed(_)));
        assert!(matches!(&*rx.borrow(), SubmissionState::Failed { reason } if reason.contains("simulated outage")));
    }

    #[tokio::test]
    async fn both_attachments_upload_and_land_on_the_report() {
        let id = Uuid::now_v7();
        let mut storage = MockObjectStorage::new();
        storage
            .expect_put()
            .times(2)
            .returning(|path, _, _| Ok(format!("https://files.test/{path}")));
        let mut repo = repo_with_path();
        repo.expect_create()
            .withf(|_, r| {
                r.media_url.as_deref().is_some_and(|u| u.contains("/midia/"))
                    && r.archive.zip_url().is_some_and(|u| u.contains("/banco_de_dados/"))
            })
            .times(1)
            .returning(move |_, _| Ok(id));
        let (svc, _) = service(repo, storage);

        let mut input = acme();
        input.media_file = Some(FileUpload::new("clip.mp4", "video/mp4", vec![1]));
        input.zip_file = Some(FileUpload::new("db.zip", "application/zip", vec![2]));
        let who = Principal::new("anon-1");
        assert_eq!(svc.submit(Some(&who), input).await.unwrap(), id);
    }

    #[tokio::test]
    async fn persistence_error_is_surfaced_verbatim() {
        let mut repo = repo_with_path();
        repo.expect_create()
            .returning(|_, _| Err(StoreError::Unavailable("quota exceeded for collection".into())));
        let (svc, _) = service(repo, MockObjectStorage::new());

        let who = Principal::new("anon-1");
        let err = svc.submit(Some(&who), acme()).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded for collection");
    }

    #[tokio::test]
    async fn stalled_write_times_out() {
        struct Stalled(LiveQueryHub);

        #[async_trait::async_trait]
        impl ReportRepository for Stalled {
            async fn create(&self, _: &Principal, _: NewReport) -> std::result::Result<ReportId, StoreError> {
                std::future::pending().await
            }
            async fn patch(&self, _: &Principal, id: ReportId, _: ReportPatch) -> std::result::Result<Report, StoreError> {
                Err(StoreError::NotFound(id))
            }
            async fn delete(&self, _: &Principal, id: ReportId) -> std::result::Result<(), StoreError> {
                Err(StoreError::NotFound(id))
            }
            fn subscribe(&self) -> ReportSubscription {
                self.0.subscribe()
            }
            fn collection_path(&self) -> String {
                PATH.into()
            }
        }

        let bus = Arc::new(DiagnosticsBus::default());
        let svc = ReportService::new(
            Arc::new(Stalled(LiveQueryHub::default())),
            Arc::new(MockObjectStorage::new()),
            AttachmentPolicy::default(),
            ErrorClassifier::new(bus),
        )
        .with_stage_timeout(Duration::from_millis(20));

        let who = Principal::new("anon-1");
        let err = svc.submit(Some(&who), acme()).await.unwrap_err();
        assert!(matches!(err, DomainError::Persistence(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn toggle_writes_only_the_status() {
        let id = Uuid::now_v7();
        let mut repo = repo_with_path();
        repo.expect_patch()
            .withf(move |_, got, patch| *got == id && *patch == ReportPatch::status(ReportStatus::Concluded))
            .times(1)
            .returning(|_, id, patch| Ok(committed(id, patch.status.unwrap())));
        let (svc, _) = service(repo, MockObjectStorage::new());

        let who = Principal::new("staff");
        let status = svc.toggle_status(&who, id, ReportStatus::Open).await.unwrap();
        assert_eq!(status, ReportStatus::Concluded);
    }

    #[tokio::test]
    async fn refused_toggle_rolls_back_and_publishes_diagnostics() {
        let id = Uuid::now_v7();
        let mut repo = repo_with_path();
        repo.expect_patch()
            .returning(|_, _, _| Err(StoreError::PermissionDenied("read-only deployment".into())));
        let (svc, bus) = service(repo, MockObjectStorage::new());
        let mut diagnostics = bus.subscribe();

        let who = Principal::new("anon-2");
        let mut affordance = StatusAffordance::new(ReportStatus::Open);
        let err = svc.toggle_with_affordance(&who, id, &mut affordance).await.unwrap_err();

        assert!(matches!(err, DomainError::PermissionDenied(_)));
        assert_eq!(affordance.shown(), ReportStatus::Open);
        assert!(!affordance.is_pending());

        let event = diagnostics.recv().await.unwrap();
        assert_eq!(event.path, format!("{PATH}/{id}"));
        assert_eq!(event.operation, OperationKind::Update);
        assert_eq!(event.request_resource_data, Some(serde_json::json!({ "status": "concluded" })));
    }

    #[tokio::test]
    async fn delete_of_missing_report_is_not_found() {
        let id = Uuid::now_v7();
        let mut repo = repo_with_path();
        repo.expect_delete().returning(|_, id| Err(StoreError::NotFound(id)));
        let (svc, bus) = service(repo, MockObjectStorage::new());
        let mut diagnostics = bus.subscribe();

        let who = Principal::new("staff");
        assert_eq!(svc.delete(&who, id).await.unwrap_err(), DomainError::NotFound(id));
        assert!(diagnostics.try_recv().is_err());
    }

    #[tokio::test]
    async fn edit_rejects_blank_fields_without_writing() {
        let mut repo = repo_with_path();
        repo.expect_patch().never();
        let (svc, _) = service(repo, MockObjectStorage::new());

        let who = Principal::new("staff");
        let edit = ReportEdit {
            technician_name: Some("".into()),
            ..Default::default()
        };
        let err = svc.edit(&who, Uuid::now_v7(), &edit).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn finished_tracker_follows_the_next_attempt() {
        let (first, second) = (Uuid::now_v7(), Uuid::now_v7());
        let mut repo = repo_with_path();
        let mut seq = mockall::Sequence::new();
        repo.expect_create().times(1).in_sequence(&mut seq).returning(move |_, _| Ok(first));
        repo.expect_create().times(1).in_sequence(&mut seq).returning(move |_, _| Ok(second));
        let (svc, _) = service(repo, MockObjectStorage::new());

        let (progress, rx) = SubmissionProgress::new();
        let who = Principal::new("anon-1");
        assert_ok!(svc.submit_with_progress(Some(&who), acme(), &progress).await);
        assert_eq!(*rx.borrow(), SubmissionState::Committed { report_id: first });

        assert_ok!(svc.submit_with_progress(Some(&who), acme(), &progress).await);
        assert_eq!(*rx.borrow(), SubmissionState::Committed { report_id: second });
    }

    #[tokio::test]
    async fn tracker_still_in_flight_refuses_a_second_attempt() {
        let mut repo = repo_with_path();
        repo.expect_create().never();
        let (svc, _) = service(repo, MockObjectStorage::new());

        let (progress, rx) = SubmissionProgress::new();
        progress.advance(SubmissionState::Uploading);
        assert!(!progress.reset());

        let err = svc
            .submit_with_progress(Some(&Principal::new("anon-1")), acme(), &progress)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::SubmissionInFlight);
        assert_eq!(*rx.borrow(), SubmissionState::Uploading);
    }

    #[test]
    fn illegal_transitions_are_ignored() {
        let (progress, rx) = SubmissionProgress::new();
        progress.advance(SubmissionState::Persisting);
        assert_eq!(*rx.borrow(), SubmissionState::Draft);
    }

    #[test]
    fn only_forward_edges_are_legal() {
        use SubmissionState::*;
        let id = Uuid::now_v7();
        assert!(Draft.can_advance_to(&Uploading));
        assert!(Uploading.can_advance_to(&Persisting));
        assert!(Persisting.can_advance_to(&Committed { report_id: id }));
        assert!(!Draft.can_advance_to(&Persisting));
        assert!(!Uploading.can_advance_to(&Committed { report_id: id }));
        assert!(!(Committed { report_id: id }).can_advance_to(&Uploading));
        assert!(Uploading.is_in_flight() && Persisting.is_in_flight());
        assert!(!Draft.is_in_flight());
    }
}
