//! Storage error types for chatvc-storage.
//!
//! [`StorageError`] covers backend failures (SQLite, migrations, decoding of
//! stored values), entity-not-found variants for each table, and the
//! constraint outcomes the engine reacts to: duplicate names, a second root,
//! stale branch versions and merge requests that are no longer open.

use chatvc_core::{BranchId, ChatId, CheckpointId, CoreError, MergeRequestId, MergeRequestStatus};
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored identifier or enum tag could not be decoded.
    #[error("corrupt stored value: {0}")]
    Decode(#[from] CoreError),

    /// A stored timestamp could not be parsed.
    #[error("corrupt stored timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(CheckpointId),

    #[error("branch not found: {0}")]
    BranchNotFound(BranchId),

    #[error("merge request not found: {0}")]
    MergeRequestNotFound(MergeRequestId),

    /// The chat already has a parentless checkpoint.
    #[error("chat {chat} already has a root checkpoint")]
    RootAlreadyExists { chat: ChatId },

    /// A branch with this name already exists in the chat.
    #[error("branch '{name}' already exists in chat {chat}")]
    DuplicateBranchName { chat: ChatId, name: String },

    /// Compare-and-swap on a branch head lost the race.
    #[error("stale branch version: branch={branch}, expected={expected}, actual={actual}")]
    StaleBranchVersion {
        branch: BranchId,
        expected: u64,
        actual: u64,
    },

    /// A status transition was attempted on a merge request that is not open.
    #[error("merge request {id} is {status}, not open")]
    MergeRequestNotOpen {
        id: MergeRequestId,
        status: MergeRequestStatus,
    },

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}
