//! Branch handlers.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::{Branch, BranchId, ChatId};

use crate::error::ApiError;
use crate::schema::branches::{CreateBranchRequest, ListBranchesResponse};
use crate::state::AppState;

/// Creates a named branch, optionally starting at an existing checkpoint.
///
/// `POST /chats/{chat_id}/version/branch`
pub async fn create_branch(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<CreateBranchRequest>,
) -> Result<Json<Branch>, ApiError> {
    let branch = state
        .engine
        .create_branch(&chat_id, &req.name, req.base_checkpoint_id)?;
    Ok(Json(branch))
}

/// `GET /chats/{chat_id}/version/branch`
pub async fn list_branches(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<ListBranchesResponse>, ApiError> {
    let branches = state.engine.list_branches(&chat_id)?;
    Ok(Json(ListBranchesResponse { branches }))
}

/// `GET /chats/{chat_id}/version/branch/{branch_id}`
pub async fn get_branch(
    State(state): State<AppState>,
    Path((chat_id, branch_id)): Path<(ChatId, BranchId)>,
) -> Result<Json<Branch>, ApiError> {
    let branch = state.engine.get_branch_in_chat(&chat_id, branch_id)?;
    Ok(Json(branch))
}
