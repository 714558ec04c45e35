use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::Session;

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/v1/auth/anonymous
///
/// Issues a fresh anonymous principal and its session token.
pub async fn sign_in_anonymously(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.identity.sign_in_anonymously().await?;
    Ok((StatusCode::CREATED, Json(session)))
}
