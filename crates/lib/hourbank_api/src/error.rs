//! Application error types.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hourbank_core::ingest::SyncError;
use hourbank_core::provider::{ProviderError, ProviderErrorKind};
use hourbank_core::store::StoreError;
use hourbank_core::timebank::TimeBankError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::RateLimited(m) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", m.as_str()),
            AppError::BadGateway(m) => (StatusCode::BAD_GATEWAY, "provider_error", m.as_str()),
            AppError::Unavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", m.as_str())
            }
            AppError::Internal(detail) => {
                error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

/// Body rejections (bad JSON, wrong field types, missing content type).
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            StoreError::PeriodClosed(day) => {
                AppError::Conflict(format!("date {day} is inside a closed period"))
            }
            StoreError::Overlap(_) => {
                AppError::Conflict("another closed period overlaps selected range".into())
            }
            StoreError::InvalidTransition => AppError::Validation("invalid status transition".into()),
            StoreError::DbError(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<TimeBankError> for AppError {
    fn from(e: TimeBankError) -> Self {
        match e {
            TimeBankError::Validation(msg) => AppError::Validation(msg),
            TimeBankError::Store(e) => AppError::from(e),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e.kind() {
            ProviderErrorKind::InvalidCredential => {
                AppError::Validation("invalid provider api key".into())
            }
            ProviderErrorKind::WorkspaceNotFound => {
                AppError::Validation("provider workspace not found".into())
            }
            ProviderErrorKind::RateLimited => {
                AppError::RateLimited("provider rate limit reached, try again later".into())
            }
            ProviderErrorKind::Cancelled => AppError::Unavailable("request cancelled".into()),
            ProviderErrorKind::RequestFailed | ProviderErrorKind::ConnectionFailed => {
                AppError::BadGateway(e.to_string())
            }
        }
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::NotConfigured => {
                AppError::Validation("time provider is not configured".into())
            }
            SyncError::Provider(e) => AppError::from(e),
            SyncError::Store(e) => AppError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: impl Into<AppError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn provider_errors_map_to_client_statuses() {
        let status = |s: u16| ProviderError::Status {
            status: s,
            message: String::new(),
        };
        assert_eq!(status_of(status(401)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(status(404)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(status(429)), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(status(500)), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn store_conflicts_are_409() {
        let day = chrono::NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert_eq!(status_of(StoreError::PeriodClosed(day)), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::InvalidTransition),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::NotFound("closure".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn unconfigured_sync_is_a_validation_error() {
        assert_eq!(status_of(SyncError::NotConfigured), StatusCode::BAD_REQUEST);
    }
}
