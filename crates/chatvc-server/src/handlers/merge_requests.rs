//! Merge request handlers.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::{ChatId, MergeRequest, MergeRequestId, NewMergeRequest};

use crate::error::ApiError;
use crate::schema::merge_requests::{
    CreateMergeRequestRequest, ListMergeRequestsResponse, MergeRequestBody, MergeResponse,
};
use crate::state::AppState;

/// Opens a merge request between two branches of the chat.
///
/// `POST /chats/{chat_id}/version/merge-request`
pub async fn create_merge_request(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<CreateMergeRequestRequest>,
) -> Result<Json<MergeRequest>, ApiError> {
    let request = state.engine.create_merge_request(NewMergeRequest {
        chat_id,
        source_branch_id: req.source_branch_id,
        target_branch_id: req.target_branch_id,
        title: req.title,
        description: req.description,
        created_by: req.author,
    })?;
    Ok(Json(request))
}

/// `GET /chats/{chat_id}/version/merge-request`
pub async fn list_merge_requests(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<ListMergeRequestsResponse>, ApiError> {
    let merge_requests = state.engine.list_merge_requests(&chat_id)?;
    Ok(Json(ListMergeRequestsResponse { merge_requests }))
}

/// `GET /version/merge-request/{id}`
pub async fn get_merge_request(
    State(state): State<AppState>,
    Path(id): Path<MergeRequestId>,
) -> Result<Json<MergeRequest>, ApiError> {
    let request = state.engine.get_merge_request(id)?;
    Ok(Json(request))
}

/// Integrates the source branch into the target branch.
///
/// `POST /version/merge-request/{id}/merge`
pub async fn merge(
    State(state): State<AppState>,
    Path(id): Path<MergeRequestId>,
    Json(req): Json<MergeRequestBody>,
) -> Result<Json<MergeResponse>, ApiError> {
    let merge_request = state.engine.merge(id, req.strategy, &req.author)?;
    let target_branch = state.engine.get_branch(merge_request.target_branch_id)?;
    Ok(Json(MergeResponse {
        merge_request,
        target_branch,
    }))
}

/// Closes an open merge request without merging.
///
/// `POST /version/merge-request/{id}/close`
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<MergeRequestId>,
) -> Result<Json<MergeRequest>, ApiError> {
    let request = state.engine.close_merge_request(id)?;
    Ok(Json(request))
}
