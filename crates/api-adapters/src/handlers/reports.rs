//! Handlers for `/api/v1/reports`.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use domains::{DomainError, FileUpload, Report, ReportEdit, ReportId, ReportStatus, ReportSubmission};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentPrincipal, MaybePrincipal};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub report_id: ReportId,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    /// The status the viewer currently sees.
    pub current: ReportStatus,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub id: ReportId,
    pub status: ReportStatus,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /api/v1/reports
pub async fn submit(
    State(state): State<AppState>,
    MaybePrincipal(principal): MaybePrincipal,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    // refuse before buffering attachments
    if principal.is_none() {
        state.metrics.record_submission(submission_outcome(&DomainError::NotAuthenticated));
        return Err(DomainError::NotAuthenticated.into());
    }
    let submission = read_submission(multipart).await?;
    match state.reports.submit(principal.as_ref(), submission).await {
        Ok(report_id) => {
            state.metrics.record_submission("committed");
            Ok((
                StatusCode::CREATED,
                Json(SubmitResponse {
                    success: true,
                    message: "Report submitted successfully.".into(),
                    report_id,
                }),
            ))
        }
        Err(err) => {
            state.metrics.record_submission(submission_outcome(&err));
            Err(err.into())
        }
    }
}

fn submission_outcome(err: &DomainError) -> &'static str {
    match err {
        DomainError::NotAuthenticated => "unauthenticated",
        DomainError::Validation(_) => "rejected",
        DomainError::UploadFailed(_) => "upload_failed",
        DomainError::PermissionDenied(_) => "denied",
        _ => "persistence_failed",
    }
}

/// Collects the multipart form into a raw submission. Unknown parts are skipped.
async fn read_submission(mut multipart: Multipart) -> ApiResult<ReportSubmission> {
    let mut submission = ReportSubmission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "mediaFile" | "zipFile" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = match field.content_type() {
                    Some(ct) => ct.to_string(),
                    None => mime_guess::from_path(&file_name).first_or_octet_stream().to_string(),
                };
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                // browsers send an empty part when no file was picked
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let upload = FileUpload::new(file_name, content_type, bytes);
                if name == "mediaFile" {
                    submission.media_file = Some(upload);
                } else {
                    submission.zip_file = Some(upload);
                }
            }
            "clientName" | "technicianName" | "errorDate" | "reportText" | "databaseSavedOnPC" => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                let slot = match name.as_str() {
                    "clientName" => &mut submission.client_name,
                    "technicianName" => &mut submission.technician_name,
                    "errorDate" => &mut submission.error_date,
                    "reportText" => &mut submission.report_text,
                    _ => &mut submission.database_saved_on_pc,
                };
                *slot = Some(text);
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok(submission)
}

// ---------------------------------------------------------------------------
// Live query
// ---------------------------------------------------------------------------

/// GET /api/v1/reports
pub async fn list(State(state): State<AppState>) -> Json<Vec<Report>> {
    let snapshot = state.reports.subscribe().initial();
    Json(snapshot.as_ref().clone())
}

/// GET /api/v1/reports/stream
///
/// The current list as the first `snapshot` event, then one per committed
/// change. Intermediate snapshots may be skipped; the latest always arrives.
pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.reports.subscribe().into_receiver();
    let events = WatchStream::new(receiver).filter_map(|snapshot| {
        Event::default()
            .event("snapshot")
            .json_data(snapshot.as_ref())
            .ok()
            .map(Ok)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// PATCH /api/v1/reports/{id}
pub async fn edit(
    State(state): State<AppState>,
    CurrentPrincipal(actor): CurrentPrincipal,
    Path(id): Path<ReportId>,
    Json(edit): Json<ReportEdit>,
) -> ApiResult<Json<Report>> {
    let result = state.reports.edit(&actor, id, &edit).await;
    state.metrics.record_mutation("update", mutation_outcome(&result));
    Ok(Json(result?))
}

/// POST /api/v1/reports/{id}/status
pub async fn toggle_status(
    State(state): State<AppState>,
    CurrentPrincipal(actor): CurrentPrincipal,
    Path(id): Path<ReportId>,
    Json(body): Json<ToggleRequest>,
) -> ApiResult<Json<ToggleResponse>> {
    let result = state.reports.toggle_status(&actor, id, body.current).await;
    state.metrics.record_mutation("toggle", mutation_outcome(&result));
    Ok(Json(ToggleResponse { id, status: result? }))
}

/// DELETE /api/v1/reports/{id}
pub async fn delete(
    State(state): State<AppState>,
    CurrentPrincipal(actor): CurrentPrincipal,
    Path(id): Path<ReportId>,
) -> ApiResult<StatusCode> {
    let result = state.reports.delete(&actor, id).await;
    state.metrics.record_mutation("delete", mutation_outcome(&result));
    result?;
    Ok(StatusCode::NO_CONTENT)
}

fn mutation_outcome<T>(result: &Result<T, DomainError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(DomainError::NotFound(_)) => "not_found",
        Err(DomainError::PermissionDenied(_)) => "denied",
        Err(DomainError::Validation(_)) => "rejected",
        Err(_) => "failed",
    }
}
