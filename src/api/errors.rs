use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::classification::ClassificationError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<ClassificationError> for ApiError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::InsufficientData(_) | ClassificationError::InvalidMetric { .. } => {
                ApiError::Unprocessable(err.to_string())
            }
            ClassificationError::UnsupportedMethod(_) => ApiError::BadRequest(err.to_string()),
            ClassificationError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ClassificationError::ConcurrentWriteConflict(_) => ApiError::Conflict(err.to_string()),
            ClassificationError::UpstreamUnavailable(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            ClassificationError::WeightMismatch { .. }
            | ClassificationError::MalformedMatrix(_)
            | ClassificationError::Storage(_) => ApiError::internal(err, "Classification failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ClassificationError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn classification_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(ClassificationError::InsufficientData("none".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ClassificationError::InvalidMetric { dropped: Vec::new() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ClassificationError::UnsupportedMethod("fuzzy".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ClassificationError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ClassificationError::ConcurrentWriteConflict("k".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ClassificationError::UpstreamUnavailable("db".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ClassificationError::Storage("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_the_cause() {
        match ApiError::from(ClassificationError::Storage("secret detail".into())) {
            ApiError::Internal(detail) => assert_eq!(detail, "Classification failed"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
