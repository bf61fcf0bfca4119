//! Comment handlers for checkpoints and merge requests.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::{CheckpointId, Comment, CommentParent, MergeRequestId};

use crate::error::ApiError;
use crate::schema::comments::{AddCommentRequest, ListCommentsResponse};
use crate::state::AppState;

fn list(state: &AppState, parent: CommentParent) -> Result<ListCommentsResponse, ApiError> {
    let comments = state.engine.list_comments(parent)?;
    Ok(ListCommentsResponse {
        total: comments.len(),
        comments,
    })
}

fn add(
    state: &AppState,
    parent: CommentParent,
    req: AddCommentRequest,
) -> Result<Comment, ApiError> {
    Ok(state
        .engine
        .add_comment(parent, &req.author_id, &req.content)?)
}

/// `GET /version/checkpoint/{id}/comments`
pub async fn list_checkpoint_comments(
    State(state): State<AppState>,
    Path(id): Path<CheckpointId>,
) -> Result<Json<ListCommentsResponse>, ApiError> {
    Ok(Json(list(&state, CommentParent::Checkpoint(id))?))
}

/// `POST /version/checkpoint/{id}/comments`
pub async fn add_checkpoint_comment(
    State(state): State<AppState>,
    Path(id): Path<CheckpointId>,
    Json(req): Json<AddCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(add(&state, CommentParent::Checkpoint(id), req)?))
}

/// `GET /version/merge-request/{id}/comments`
pub async fn list_merge_request_comments(
    State(state): State<AppState>,
    Path(id): Path<MergeRequestId>,
) -> Result<Json<ListCommentsResponse>, ApiError> {
    Ok(Json(list(&state, CommentParent::MergeRequest(id))?))
}

/// `POST /version/merge-request/{id}/comments`
pub async fn add_merge_request_comment(
    State(state): State<AppState>,
    Path(id): Path<MergeRequestId>,
    Json(req): Json<AddCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(add(&state, CommentParent::MergeRequest(id), req)?))
}
