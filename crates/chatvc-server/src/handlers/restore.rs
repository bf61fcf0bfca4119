//! Restore handler.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::ChatId;
use chatvc_engine::RestoreRequest;

use crate::error::ApiError;
use crate::schema::restore::{RestoreCheckpointRequest, RestoreCheckpointResponse};
use crate::state::AppState;

/// Moves a branch back to an earlier checkpoint using the requested strategy.
///
/// `POST /chats/{chat_id}/version/restore`
pub async fn restore(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<RestoreCheckpointRequest>,
) -> Result<Json<RestoreCheckpointResponse>, ApiError> {
    state.engine.get_branch_in_chat(&chat_id, req.branch_id)?;

    let branch = state.engine.restore(RestoreRequest {
        branch_id: req.branch_id,
        target_checkpoint_id: req.checkpoint_id,
        strategy: req.strategy,
        author: req.author,
        expected_version: req.expected_version,
    })?;

    Ok(Json(RestoreCheckpointResponse {
        strategy: req.strategy,
        branch,
    }))
}
