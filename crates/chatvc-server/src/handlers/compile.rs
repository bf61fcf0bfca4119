//! Compile handler.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::ChatId;

use crate::error::ApiError;
use crate::schema::compile::{CompileRequest, CompileResponse};
use crate::state::AppState;

/// Linearizes the branch history into the message sequence a conversation
/// replays.
///
/// `POST /chats/{chat_id}/version/compile`
pub async fn compile(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<CompileRequest>,
) -> Result<Json<CompileResponse>, ApiError> {
    state.engine.get_branch_in_chat(&chat_id, req.branch_id)?;
    let compiled = state.engine.compile(req.branch_id)?;
    Ok(Json(compiled.into()))
}
