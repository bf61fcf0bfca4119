//! Whole-chat version overview.

use axum::extract::{Path, State};
use axum::Json;

use chatvc_core::ChatId;
use chatvc_engine::VersionOverview;

use crate::error::ApiError;
use crate::state::AppState;

/// Returns every branch, checkpoint and merge request of a chat.
///
/// `GET /chats/{chat_id}/version`
pub async fn overview(
    State(state): State<AppState>,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<VersionOverview>, ApiError> {
    let overview = state.engine.overview(&chat_id)?;
    Ok(Json(overview))
}
