//! Append-only comments on checkpoints and merge requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{CheckpointId, CommentId, MergeRequestId};

/// What a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "parent_type", content = "parent_id", rename_all = "snake_case")]
pub enum CommentParent {
    Checkpoint(CheckpointId),
    MergeRequest(MergeRequestId),
}

impl CommentParent {
    pub fn type_name(&self) -> &'static str {
        match self {
            CommentParent::Checkpoint(_) => "checkpoint",
            CommentParent::MergeRequest(_) => "merge_request",
        }
    }

    pub fn id_string(&self) -> String {
        match self {
            CommentParent::Checkpoint(id) => id.to_string(),
            CommentParent::MergeRequest(id) => id.to_string(),
        }
    }

    /// Rebuilds a parent from its stored `(type, id)` text columns.
    pub fn from_parts(type_name: &str, id: &str) -> Result<Self, CoreError> {
        match type_name {
            "checkpoint" => Ok(CommentParent::Checkpoint(id.parse()?)),
            "merge_request" => Ok(CommentParent::MergeRequest(id.parse()?)),
            other => Err(CoreError::UnknownParentType {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub parent: CommentParent,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(parent: CommentParent, author_id: impl Into<String>, content: impl Into<String>) -> Self {
        Comment {
            id: CommentId::new(),
            parent,
            author_id: author_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
