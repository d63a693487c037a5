use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::constants::{PLAYER_NOT_FOUND_ERROR, QUOTA_EXCEEDED_ERROR, STORAGE_UNAVAILABLE_ERROR};
use shared::shared_wheel_game::{ErrorCode, ErrorResponse};
use shared::validation::describe;
use tracing::error;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("player not found: {0}")]
    PlayerNotFound(String),
    #[error("daily spin quota exhausted for {0}")]
    QuotaExceeded(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl LedgerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::PlayerNotFound(_) => ErrorCode::PlayerNotFound,
            Self::QuotaExceeded(_) => ErrorCode::QuotaExceeded,
            Self::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
        }
    }

    /// Only infrastructure failures are worth trying again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Maps a store failure for an operation on `name`.
    pub fn from_store(err: StoreError, name: &str) -> Self {
        match err {
            StoreError::NotFound => Self::PlayerNotFound(name.to_string()),
            // Racing creates are resolved by the service; surfacing one here means the store
            // contract was broken.
            StoreError::AlreadyExists => {
                Self::StorageUnavailable(format!("unexpected duplicate record for {}", name))
            }
            StoreError::Unavailable(reason) => Self::StorageUnavailable(reason),
        }
    }
}

impl From<validator::ValidationError> for LedgerError {
    fn from(err: validator::ValidationError) -> Self {
        Self::Validation(describe(&err))
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::PlayerNotFound(_) => (StatusCode::NOT_FOUND, PLAYER_NOT_FOUND_ERROR.to_string()),
            Self::QuotaExceeded(_) => (
                StatusCode::TOO_MANY_REQUESTS,
                QUOTA_EXCEEDED_ERROR.to_string(),
            ),
            Self::StorageUnavailable(reason) => {
                error!("Storage unavailable: {}", reason);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    STORAGE_UNAVAILABLE_ERROR.to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: self.code(),
            retryable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_ledger_errors() {
        assert!(matches!(
            LedgerError::from_store(StoreError::NotFound, "bob"),
            LedgerError::PlayerNotFound(name) if name == "bob"
        ));
        let unavailable = LedgerError::from_store(StoreError::Unavailable("io".into()), "bob");
        assert!(unavailable.is_retryable());
        assert_eq!(unavailable.code(), ErrorCode::StorageUnavailable);
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (LedgerError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::PlayerNotFound("x".into()), StatusCode::NOT_FOUND),
            (LedgerError::QuotaExceeded("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (
                LedgerError::StorageUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_only_storage_failures_are_retryable() {
        assert!(!LedgerError::QuotaExceeded("alice".into()).is_retryable());
        assert!(!LedgerError::Validation("bad".into()).is_retryable());
    }
}
