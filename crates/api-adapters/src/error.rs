use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{AuthError, DomainError};
use serde_json::json;

/// Error type for HTTP handlers.
///
/// Renders as `{ success: false, message, code, errors? }`; `errors` carries
/// field-keyed messages for validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => match err {
                DomainError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
                DomainError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                DomainError::InFlight(_) | DomainError::SubmissionInFlight => StatusCode::CONFLICT,
            },
            ApiError::Auth(AuthError::InvalidToken) | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::SignInFailed(_)) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Domain(err) => match err {
                DomainError::NotAuthenticated => "NOT_AUTHENTICATED",
                DomainError::Validation(_) => "VALIDATION_FAILED",
                DomainError::UploadFailed(_) => "UPLOAD_FAILED",
                DomainError::Persistence(_) => "PERSISTENCE_FAILED",
                DomainError::NotFound(_) => "NOT_FOUND",
                DomainError::PermissionDenied(_) => "PERMISSION_DENIED",
                DomainError::InFlight(_) | DomainError::SubmissionInFlight => "CONFLICT",
            },
            ApiError::Auth(AuthError::InvalidToken) | ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Auth(AuthError::SignInFailed(_)) => "SIGN_IN_FAILED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = match &self {
            ApiError::Domain(DomainError::Validation(errors)) => json!({
                "success": false,
                "message": "Please correct the highlighted fields.",
                "code": code,
                "errors": errors.messages(),
            }),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                json!({ "success": false, "message": "An internal error occurred", "code": code })
            }
            other => json!({ "success": false, "message": other.to_string(), "code": code }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{FieldErrors, ViolationKind};

    #[test]
    fn persistence_message_reaches_the_client_verbatim() {
        let err = ApiError::from(DomainError::Persistence("quota exceeded".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn validation_maps_to_unprocessable() {
        let mut errors = FieldErrors::new();
        errors.add("clientName", ViolationKind::RequiredFieldMissing, "Client name is required.");
        let err = ApiError::from(DomainError::Validation(errors));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
