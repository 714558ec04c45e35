//! End-to-end submission and mutation scenarios against the in-memory desk.

use domains::{
    AccessPolicy, ArchiveMode, ArchiveRecord, AttachmentPolicy, Attestation, DomainError, PolicyProfile, ReportEdit,
    ReportStatus, ViolationKind,
};
use integration_tests::{anon, file, submission, Desk};
use services::{SubmissionProgress, SubmissionState};

#[tokio::test]
async fn acme_report_is_committed_and_listed() {
    let desk = Desk::new(AccessPolicy::open());
    let who = anon("anon-1");

    let id = desk.service.submit(Some(&who), submission("Acme")).await.unwrap();

    let snapshot = desk.service.subscribe().initial();
    assert_eq!(snapshot.len(), 1);
    let report = &snapshot[0];
    assert_eq!(report.id, id);
    assert_eq!(report.client_name, "Acme");
    assert_eq!(report.technician_name, "Jo");
    assert_eq!(report.error_date.to_string(), "2024-01-05");
    assert_eq!(report.report_text, "disk full");
    assert_eq!(report.media_url, None);
    assert_eq!(report.archive, ArchiveRecord::ZipUrl(None));
    assert_eq!(report.reported_by_user_id, "anon-1");
    assert_eq!(report.status, ReportStatus::Open);
}

#[tokio::test]
async fn missing_fields_are_reported_and_nothing_is_stored() {
    let desk = Desk::new(AccessPolicy::open());
    let mut input = submission("Acme");
    input.client_name = None;
    input.report_text = Some("".into());

    let err = desk.service.submit(Some(&anon("anon-1")), input).await.unwrap_err();
    let DomainError::Validation(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    assert_eq!(errors.fields().collect::<Vec<_>>(), ["clientName", "reportText"]);
    assert_eq!(desk.repo.len().await, 0);
}

#[tokio::test]
async fn oversize_file_is_too_large_whatever_its_type() {
    let policy = AttachmentPolicy::for_profile(PolicyProfile::Compact, ArchiveMode::Archive);
    let desk = Desk::with_policy(AccessPolicy::open(), policy);
    let mut input = submission("Acme");
    input.media_file = Some(file("big.png", "image/png", 1024 * 1024 + 1));
    input.zip_file = Some(file("big.exe", "application/x-msdownload", 1024 * 1024 + 1));

    let DomainError::Validation(errors) = desk.service.submit(Some(&anon("anon-1")), input).await.unwrap_err() else {
        panic!("expected validation errors");
    };
    assert!(errors.has("mediaFile", ViolationKind::FileTooLarge));
    assert!(errors.has("zipFile", ViolationKind::FileTooLarge));
    assert!(errors.has("zipFile", ViolationKind::UnsupportedMediaType));
    assert!(desk.media.is_empty());
}

#[tokio::test]
async fn attestation_deployments_record_the_answer() {
    let policy = AttachmentPolicy::for_profile(PolicyProfile::Standard, ArchiveMode::Attestation);
    let desk = Desk::with_policy(AccessPolicy::open(), policy);
    let mut input = submission("Acme");
    input.database_saved_on_pc = Some("sim".into());

    let id = desk.service.submit(Some(&anon("anon-1")), input).await.unwrap();
    let stored = desk.repo.get(id).await.unwrap();
    assert_eq!(stored.archive, ArchiveRecord::DatabaseSavedOnPc(Attestation::Yes));

    let json = serde_json::to_value(&stored).unwrap();
    assert_eq!(json["databaseSavedOnPC"], "sim");
    assert!(json.get("zipUrl").is_none());
}

#[tokio::test]
async fn media_outage_fails_the_submission_and_leaves_the_list_alone() {
    let desk = Desk::new(AccessPolicy::open());
    let who = anon("anon-1");
    desk.service.submit(Some(&who), submission("Earlier")).await.unwrap();
    desk.media.set_available(false);

    let mut input = submission("Acme");
    input.media_file = Some(file("clip.mp4", "video/mp4", 64));
    let (progress, state) = SubmissionProgress::new();
    let err = desk
        .service
        .submit_with_progress(Some(&who), input, &progress)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::UploadFailed(_)));
    assert!(matches!(*state.borrow(), SubmissionState::Failed { .. }));
    let snapshot = desk.service.subscribe().initial();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].client_name, "Earlier");
}

#[tokio::test]
async fn archive_failure_aborts_even_when_the_media_upload_succeeds() {
    let desk = Desk::new(AccessPolicy::open());
    desk.media.refuse_under("error_reports/banco_de_dados/");
    let mut input = submission("Acme");
    input.media_file = Some(file("shot.png", "image/png", 16));
    input.zip_file = Some(file("db.zip", "application/zip", 16));

    let (progress, state) = SubmissionProgress::new();
    let err = desk
        .service
        .submit_with_progress(Some(&anon("anon-1")), input, &progress)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::UploadFailed(_)));
    assert!(matches!(*state.borrow(), SubmissionState::Failed { .. }));
    assert_eq!(desk.repo.len().await, 0);
    assert!(desk.media.paths().iter().all(|path| !path.contains("banco_de_dados")));
}

#[tokio::test]
async fn toggling_twice_restores_the_original_status() {
    let desk = Desk::new(AccessPolicy::open());
    let who = anon("anon-1");
    let id = desk.service.submit(Some(&who), submission("Acme")).await.unwrap();

    let once = desk.service.toggle_status(&who, id, ReportStatus::Open).await.unwrap();
    let twice = desk.service.toggle_status(&who, id, once).await.unwrap();
    assert_eq!(once, ReportStatus::Concluded);
    assert_eq!(twice, ReportStatus::Open);
    assert_eq!(desk.repo.get(id).await.unwrap().status, ReportStatus::Open);
}

#[tokio::test]
async fn edit_round_trips_everything_but_server_fields() {
    let desk = Desk::new(AccessPolicy::open());
    let who = anon("anon-1");
    let id = desk.service.submit(Some(&who), submission("Acme")).await.unwrap();
    let before = desk.repo.get(id).await.unwrap();

    let edit = ReportEdit {
        client_name: Some("  Acme Corp ".into()),
        report_text: Some("disk full\n\n  again".into()),
        ..Default::default()
    };
    let after = desk.service.edit(&who, id, &edit).await.unwrap();

    assert_eq!(after.client_name, "  Acme Corp ");
    assert_eq!(after.report_text, "disk full\n\n  again");
    assert_eq!(after.technician_name, before.technician_name);
    assert_eq!(after.generated_at, before.generated_at);
    assert_eq!(after.reported_by_user_id, before.reported_by_user_id);
}

#[tokio::test]
async fn submitted_fields_come_back_unchanged() {
    let desk = Desk::new(AccessPolicy::open());
    let mut input = submission(" Acme ");
    input.technician_name = Some("Jo  ".into());
    input.report_text = Some("\tdisk full\n\n".into());

    let id = desk.service.submit(Some(&anon("anon-1")), input).await.unwrap();
    let stored = desk.repo.get(id).await.unwrap();
    assert_eq!(stored.client_name, " Acme ");
    assert_eq!(stored.technician_name, "Jo  ");
    assert_eq!(stored.report_text, "\tdisk full\n\n");
}

#[tokio::test]
async fn delete_is_final() {
    let desk = Desk::new(AccessPolicy::open());
    let who = anon("anon-1");
    let id = desk.service.submit(Some(&who), submission("Acme")).await.unwrap();

    desk.service.delete(&who, id).await.unwrap();
    assert_eq!(desk.service.delete(&who, id).await.unwrap_err(), DomainError::NotFound(id));
    assert_eq!(
        desk.service.toggle_status(&who, id, ReportStatus::Open).await.unwrap_err(),
        DomainError::NotFound(id)
    );
}

#[tokio::test]
async fn submitting_without_a_principal_does_nothing() {
    let desk = Desk::new(AccessPolicy::open());
    let err = desk.service.submit(None, submission("Acme")).await.unwrap_err();
    assert_eq!(err, DomainError::NotAuthenticated);
    assert_eq!(desk.repo.len().await, 0);
}
