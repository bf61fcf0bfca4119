//! Checkpoint handlers.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::{ChatId, Checkpoint, CheckpointId};
use chatvc_engine::CommitRequest;

use crate::error::ApiError;
use crate::schema::checkpoints::{CreateCheckpointRequest, CreateCheckpointResponse};
use crate::state::AppState;

/// Records new messages as a checkpoint on top of the branch head and
/// advances the branch to it.
///
/// `POST /chats/{chat_id}/version/checkpoint`
pub async fn create_checkpoint(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<CreateCheckpointRequest>,
) -> Result<Json<CreateCheckpointResponse>, ApiError> {
    state.engine.get_branch_in_chat(&chat_id, req.branch_id)?;

    let outcome = state.engine.commit(CommitRequest {
        branch_id: req.branch_id,
        label: req.label,
        comment: req.comment,
        message_ids: req.message_ids,
        author: req.author,
        expected_version: req.expected_version,
    })?;

    Ok(Json(CreateCheckpointResponse {
        checkpoint: outcome.checkpoint,
        branch: outcome.branch,
    }))
}

/// `GET /chats/{chat_id}/version/checkpoint/{checkpoint_id}`
pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path((chat_id, checkpoint_id)): Path<(ChatId, CheckpointId)>,
) -> Result<Json<Checkpoint>, ApiError> {
    let checkpoint = state.engine.get_checkpoint(checkpoint_id)?;
    if checkpoint.chat_id != chat_id {
        return Err(ApiError::NotFound(format!(
            "checkpoint {} not found in chat {}",
            checkpoint_id, chat_id
        )));
    }
    Ok(Json(checkpoint))
}
