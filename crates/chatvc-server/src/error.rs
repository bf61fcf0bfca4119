//! Mapping of engine failures onto HTTP responses.
//!
//! Engine error kinds keep their machine-readable code; the status follows
//! the kind (404 missing, 400 malformed references, 409 conflicts, 422
//! requests that cannot apply to the current history, 500 storage).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use chatvc_engine::VersionError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "STALE_HEAD", "NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g., expected vs. actual version).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Errors returned by handlers; every variant renders as the
/// `{"success": false, "error": {...}}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A path entity outside the chat named in the path (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// A typed engine failure; status and code follow the error kind.
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// HTTP status for an engine error kind.
pub fn version_status(err: &VersionError) -> StatusCode {
    match err {
        VersionError::NotFound { .. } => StatusCode::NOT_FOUND,
        VersionError::UnknownParent { .. } | VersionError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        VersionError::DuplicateName { .. }
        | VersionError::StaleHead { .. }
        | VersionError::AlreadyResolved { .. }
        | VersionError::MergeConflict { .. }
        | VersionError::MessageAlreadyCaptured { .. } => StatusCode::CONFLICT,
        VersionError::InvalidStrategy { .. }
        | VersionError::NothingToMerge { .. }
        | VersionError::EmptyBranch { .. }
        | VersionError::EmptyLineage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        VersionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn version_details(err: &VersionError) -> Option<serde_json::Value> {
    match err {
        VersionError::StaleHead {
            branch,
            expected,
            actual,
        } => Some(serde_json::json!({
            "branch_id": branch,
            "expected_version": expected,
            "actual_version": actual,
            "retryable": true,
        })),
        VersionError::MergeConflict { target, .. } => Some(serde_json::json!({
            "target_branch_id": target,
            "retryable": true,
        })),
        VersionError::NothingToMerge {
            source_branch,
            target_branch,
            ..
        } => Some(serde_json::json!({
            "source_branch_id": source_branch,
            "target_branch_id": target_branch,
            "retryable": false,
        })),
        VersionError::InvalidStrategy { strategy, .. } => {
            Some(serde_json::json!({ "strategy": strategy }))
        }
        VersionError::MessageAlreadyCaptured { message } => {
            Some(serde_json::json!({ "message_id": message }))
        }
        _ => None,
    }
}

impl ApiErrorDetail {
    fn plain(code: &str, message: &str) -> Self {
        ApiErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }
}

impl ApiError {
    /// HTTP status and response body for this error.
    pub fn status_and_detail(&self) -> (StatusCode, ApiErrorDetail) {
        match self {
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ApiErrorDetail::plain("NOT_FOUND", msg))
            }
            ApiError::Version(err) => (
                version_status(err),
                ApiErrorDetail {
                    code: err.code().to_string(),
                    message: err.to_string(),
                    details: version_details(err),
                },
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = serde_json::json!({ "success": false, "error": detail });
        (status, axum::Json(body)).into_response()
    }
}

impl From<chatvc_storage::StorageError> for ApiError {
    fn from(err: chatvc_storage::StorageError) -> Self {
        ApiError::Version(err.into())
    }
}
