use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::{header, request::Parts, HeaderMap},
    Form, Json,
};

use super::{errors::AppError, AppState};
use crate::error::ServiceError;

/// Username of the caller, taken from a valid `Authorization: Bearer` token.
///
/// Any failure (no header, wrong scheme, bad signature, expired token) is
/// rejected with the same 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ServiceError::InvalidToken)?;
        let username = state.tokens.verify(token)?;
        Ok(AuthUser { username })
    }
}

/// Token of an `Authorization` header using the bearer scheme. The scheme
/// name is matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

// ---------------------------------------------------------------------------
// Body / query extractors reporting malformed input as validation errors
// ---------------------------------------------------------------------------

/// [`Json`] whose rejection is a 400 `{"error": ...}`.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|r| ServiceError::Validation(r.body_text()))?;
        Ok(Self(value))
    }
}

/// [`Form`] whose rejection is a 400 `{"error": ...}`.
#[derive(Debug)]
pub struct ValidForm<T>(pub T);

impl<S, T> FromRequest<S> for ValidForm<T>
where
    Form<T>: FromRequest<S, Rejection = FormRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|r| ServiceError::Validation(r.body_text()))?;
        Ok(Self(value))
    }
}

/// [`Query`] whose rejection is a 400 `{"error": ...}`.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|r| ServiceError::Validation(r.body_text()))?;
        Ok(Self(value))
    }
}
