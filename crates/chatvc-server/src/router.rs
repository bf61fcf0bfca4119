//! Router assembly for the chatvc HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. Chat-scoped routes take the
/// chat id from the path; merge requests, checkpoints and comments addressed
/// by their own id are global.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Chat overview
        .route("/chats/{chat_id}/version", get(handlers::version::overview))
        // Branches
        .route(
            "/chats/{chat_id}/version/branch",
            get(handlers::branches::list_branches).post(handlers::branches::create_branch),
        )
        .route(
            "/chats/{chat_id}/version/branch/{branch_id}",
            get(handlers::branches::get_branch),
        )
        // Checkpoints
        .route(
            "/chats/{chat_id}/version/checkpoint",
            post(handlers::checkpoints::create_checkpoint),
        )
        .route(
            "/chats/{chat_id}/version/checkpoint/{checkpoint_id}",
            get(handlers::checkpoints::get_checkpoint),
        )
        // Compile and restore
        .route(
            "/chats/{chat_id}/version/compile",
            post(handlers::compile::compile),
        )
        .route(
            "/chats/{chat_id}/version/restore",
            post(handlers::restore::restore),
        )
        // Merge requests
        .route(
            "/chats/{chat_id}/version/merge-request",
            get(handlers::merge_requests::list_merge_requests)
                .post(handlers::merge_requests::create_merge_request),
        )
        .route(
            "/version/merge-request/{id}",
            get(handlers::merge_requests::get_merge_request),
        )
        .route(
            "/version/merge-request/{id}/merge",
            post(handlers::merge_requests::merge),
        )
        .route(
            "/version/merge-request/{id}/close",
            post(handlers::merge_requests::close),
        )
        // Comments
        .route(
            "/version/checkpoint/{id}/comments",
            get(handlers::comments::list_checkpoint_comments)
                .post(handlers::comments::add_checkpoint_comment),
        )
        .route(
            "/version/merge-request/{id}/comments",
            get(handlers::comments::list_merge_request_comments)
                .post(handlers::comments::add_merge_request_comment),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
