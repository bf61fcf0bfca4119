//! Engine-level error kinds.
//!
//! Every failure is local and synchronous. Only [`VersionError::StaleHead`]
//! and [`VersionError::MergeConflict`] are worth retrying after re-reading
//! state; the rest are caller input errors.

use chatvc_core::{BranchId, ChatId, MergeRequestId, MergeRequestStatus, MessageId, Strategy};
use chatvc_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    /// An id that does not resolve to any stored entity.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A referenced checkpoint or branch does not exist in the chat.
    #[error("{entity} {id} does not belong to chat {chat}")]
    UnknownParent {
        entity: &'static str,
        id: String,
        chat: ChatId,
    },

    #[error("branch '{name}' already exists in chat {chat}")]
    DuplicateName { chat: ChatId, name: String },

    /// Optimistic-concurrency conflict on a branch head.
    #[error("branch {branch} moved: expected version {expected}, found {actual}")]
    StaleHead {
        branch: BranchId,
        expected: u64,
        actual: u64,
    },

    #[error("strategy {strategy} not applicable: {reason}")]
    InvalidStrategy { strategy: Strategy, reason: String },

    #[error("merge request {id} is already {status}")]
    AlreadyResolved {
        id: MergeRequestId,
        status: MergeRequestStatus,
    },

    /// The target branch moved while a merge was being computed.
    #[error("merge request {id}: target branch {target} changed during merge")]
    MergeConflict {
        id: MergeRequestId,
        target: BranchId,
    },

    /// The source head is already reachable from the target head.
    #[error("merge request {id}: branch {source_branch} has nothing that branch {target_branch} lacks")]
    NothingToMerge {
        id: MergeRequestId,
        source_branch: BranchId,
        target_branch: BranchId,
    },

    #[error("branch {branch} has no head checkpoint")]
    EmptyBranch { branch: BranchId },

    /// A parentless checkpoint was requested in a chat that already has a root.
    #[error("chat {chat} already has history; a new checkpoint needs a parent")]
    EmptyLineage { chat: ChatId },

    #[error("message {message} is already captured in this lineage")]
    MessageAlreadyCaptured { message: MessageId },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl VersionError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            VersionError::NotFound { .. } => "NOT_FOUND",
            VersionError::UnknownParent { .. } => "UNKNOWN_PARENT",
            VersionError::DuplicateName { .. } => "DUPLICATE_NAME",
            VersionError::StaleHead { .. } => "STALE_HEAD",
            VersionError::InvalidStrategy { .. } => "INVALID_STRATEGY",
            VersionError::AlreadyResolved { .. } => "ALREADY_RESOLVED",
            VersionError::MergeConflict { .. } => "MERGE_CONFLICT",
            VersionError::NothingToMerge { .. } => "NOTHING_TO_MERGE",
            VersionError::EmptyBranch { .. } => "EMPTY_BRANCH",
            VersionError::EmptyLineage { .. } => "EMPTY_LINEAGE",
            VersionError::MessageAlreadyCaptured { .. } => "MESSAGE_ALREADY_CAPTURED",
            VersionError::InvalidRequest(_) => "BAD_REQUEST",
            VersionError::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether re-reading state and retrying can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VersionError::StaleHead { .. } | VersionError::MergeConflict { .. }
        )
    }
}

impl From<StorageError> for VersionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::CheckpointNotFound(id) => VersionError::NotFound {
                entity: "checkpoint",
                id: id.to_string(),
            },
            StorageError::BranchNotFound(id) => VersionError::NotFound {
                entity: "branch",
                id: id.to_string(),
            },
            StorageError::MergeRequestNotFound(id) => VersionError::NotFound {
                entity: "merge request",
                id: id.to_string(),
            },
            StorageError::RootAlreadyExists { chat } => VersionError::EmptyLineage { chat },
            StorageError::DuplicateBranchName { chat, name } => {
                VersionError::DuplicateName { chat, name }
            }
            StorageError::StaleBranchVersion {
                branch,
                expected,
                actual,
            } => VersionError::StaleHead {
                branch,
                expected,
                actual,
            },
            StorageError::MergeRequestNotOpen { id, status } => {
                VersionError::AlreadyResolved { id, status }
            }
            other => VersionError::Storage(other),
        }
    }
}
