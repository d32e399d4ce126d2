use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::ServiceError;

/// Shown for every authentication failure, whatever the cause.
pub const UNAUTHORIZED_MESSAGE: &str = "Invalid credentials";

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Some(err) = self.0.downcast_ref::<ServiceError>() else {
            tracing::error!(error = %self.0, "Unhandled error");
            return internal();
        };

        let status = match err {
            ServiceError::Validation(_) | ServiceError::UnknownField(_) => StatusCode::BAD_REQUEST,
            ServiceError::DuplicateUsername(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidCredentials | ServiceError::InvalidToken => {
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(json!({ "error": UNAUTHORIZED_MESSAGE })),
                )
                    .into_response();
            }
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                tracing::error!(error = %err, "Request failed");
                return internal();
            }
        };

        (status, Json(json!({ "error": err.to_string() }))).into_response()
    }
}

fn internal() -> Response {
    let body = Json(json!({ "error": "An internal error occurred" }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
