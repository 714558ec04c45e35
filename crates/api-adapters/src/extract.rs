//! Bearer-token extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domains::Principal;

use crate::error::ApiError;
use crate::state::AppState;

/// A signed-in principal; rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

/// A principal when a token is present. A missing header is `None` so the
/// service can answer with its own not-authenticated error; a bad token is
/// still rejected.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

fn bearer(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| ApiError::Unauthorized("expected: Bearer <token>".into()))
}

impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer(parts)? {
            Some(token) => Ok(MaybePrincipal(Some(state.identity.verify(token)?))),
            None => Ok(MaybePrincipal(None)),
        }
    }
}

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)?.ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;
        Ok(CurrentPrincipal(state.identity.verify(token)?))
    }
}
