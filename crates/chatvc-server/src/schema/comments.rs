//! Comment API schema types.

use serde::{Deserialize, Serialize};

use chatvc_core::Comment;

/// Request to attach a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommentRequest {
    pub author_id: String,
    pub content: String,
}

/// Comments on one checkpoint or merge request, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCommentsResponse {
    pub comments: Vec<Comment>,
    pub total: usize,
}
