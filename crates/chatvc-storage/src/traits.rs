//! The [`VersionStore`] trait defining the storage contract.
//!
//! Mutation of shared rows is limited to guarded operations:
//! [`VersionStore::compare_and_swap_head`] for branch heads,
//! [`VersionStore::transition_merge_request`] for merge request status, and
//! [`VersionStore::complete_merge`], which does both at once. Everything else
//! is an insert or a read.
//!
//! Methods take `&self` and backends are `Send + Sync`, so a single store is
//! shared across request handlers without an outer lock.

use chrono::{DateTime, Utc};

use chatvc_core::{
    Branch, BranchId, ChatId, Checkpoint, CheckpointId, Comment, CommentParent, MergeRequest,
    MergeRequestId, MergeRequestStatus,
};

use crate::error::StorageError;

/// The storage contract for conversation version control.
pub trait VersionStore: Send + Sync {
    // -------------------------------------------------------------------
    // Checkpoints (insert-only)
    // -------------------------------------------------------------------

    /// Inserts a checkpoint.
    ///
    /// Fails with [`StorageError::RootAlreadyExists`] if the checkpoint has no
    /// parents and the chat already has a root. Parent existence is checked
    /// by the caller.
    fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    /// Retrieves a checkpoint by ID.
    fn get_checkpoint(&self, id: CheckpointId) -> Result<Checkpoint, StorageError>;

    /// Lists all checkpoints of a chat, oldest first (ties by id).
    fn list_checkpoints(&self, chat: &ChatId) -> Result<Vec<Checkpoint>, StorageError>;

    /// Number of checkpoints stored for a chat.
    fn count_checkpoints(&self, chat: &ChatId) -> Result<usize, StorageError>;

    // -------------------------------------------------------------------
    // Branches (head + version mutable)
    // -------------------------------------------------------------------

    /// Inserts a new branch. Fails with [`StorageError::DuplicateBranchName`]
    /// if the name is taken within the chat.
    fn insert_branch(&self, branch: &Branch) -> Result<(), StorageError>;

    fn get_branch(&self, id: BranchId) -> Result<Branch, StorageError>;

    fn find_branch_by_name(&self, chat: &ChatId, name: &str)
        -> Result<Option<Branch>, StorageError>;

    /// Lists all branches of a chat, oldest first (ties by id).
    fn list_branches(&self, chat: &ChatId) -> Result<Vec<Branch>, StorageError>;

    /// Atomically sets the head and increments the version, provided the
    /// stored version equals `expected_version`.
    ///
    /// Fails with [`StorageError::StaleBranchVersion`] otherwise. Returns the
    /// updated branch.
    fn compare_and_swap_head(
        &self,
        id: BranchId,
        expected_version: u64,
        new_head: Option<CheckpointId>,
    ) -> Result<Branch, StorageError>;

    /// Records a compilation time. Does not touch head or version.
    fn set_last_compiled(&self, id: BranchId, at: DateTime<Utc>) -> Result<Branch, StorageError>;

    // -------------------------------------------------------------------
    // Merge requests (status mutable)
    // -------------------------------------------------------------------

    fn insert_merge_request(&self, request: &MergeRequest) -> Result<(), StorageError>;

    fn get_merge_request(&self, id: MergeRequestId) -> Result<MergeRequest, StorageError>;

    /// Lists all merge requests of a chat, oldest first (ties by id).
    fn list_merge_requests(&self, chat: &ChatId) -> Result<Vec<MergeRequest>, StorageError>;

    /// Moves an open merge request to `next` (merged or closed), stamping the
    /// matching timestamp.
    ///
    /// Fails with [`StorageError::MergeRequestNotOpen`] if the request has
    /// already left the open state.
    fn transition_merge_request(
        &self,
        id: MergeRequestId,
        next: MergeRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<MergeRequest, StorageError>;

    /// Marks an open merge request merged and moves the target head in one
    /// atomic step.
    ///
    /// Fails with [`StorageError::MergeRequestNotOpen`] if the request left
    /// `open`, or [`StorageError::StaleBranchVersion`] if the target moved.
    /// On failure neither row changes. Returns the merged request and the
    /// updated target branch.
    fn complete_merge(
        &self,
        request: MergeRequestId,
        target: BranchId,
        expected_version: u64,
        new_head: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(MergeRequest, Branch), StorageError>;

    // -------------------------------------------------------------------
    // Comments (insert-only)
    // -------------------------------------------------------------------

    fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError>;

    /// Lists comments on a parent, oldest first.
    fn list_comments(&self, parent: CommentParent) -> Result<Vec<Comment>, StorageError>;
}

/// Rejects transitions that do not leave the open state.
pub(crate) fn ensure_terminal(next: MergeRequestStatus) -> Result<(), StorageError> {
    if next.is_terminal() {
        Ok(())
    } else {
        Err(StorageError::IntegrityError {
            reason: format!("cannot transition a merge request to '{}'", next),
        })
    }
}

impl<T: VersionStore + ?Sized> VersionStore for Box<T> {
    fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        (**self).insert_checkpoint(checkpoint)
    }

    fn get_checkpoint(&self, id: CheckpointId) -> Result<Checkpoint, StorageError> {
        (**self).get_checkpoint(id)
    }

    fn list_checkpoints(&self, chat: &ChatId) -> Result<Vec<Checkpoint>, StorageError> {
        (**self).list_checkpoints(chat)
    }

    fn count_checkpoints(&self, chat: &ChatId) -> Result<usize, StorageError> {
        (**self).count_checkpoints(chat)
    }

    fn insert_branch(&self, branch: &Branch) -> Result<(), StorageError> {
        (**self).insert_branch(branch)
    }

    fn get_branch(&self, id: BranchId) -> Result<Branch, StorageError> {
        (**self).get_branch(id)
    }

    fn find_branch_by_name(
        &self,
        chat: &ChatId,
        name: &str,
    ) -> Result<Option<Branch>, StorageError> {
        (**self).find_branch_by_name(chat, name)
    }

    fn list_branches(&self, chat: &ChatId) -> Result<Vec<Branch>, StorageError> {
        (**self).list_branches(chat)
    }

    fn compare_and_swap_head(
        &self,
        id: BranchId,
        expected_version: u64,
        new_head: Option<CheckpointId>,
    ) -> Result<Branch, StorageError> {
        (**self).compare_and_swap_head(id, expected_version, new_head)
    }

    fn set_last_compiled(&self, id: BranchId, at: DateTime<Utc>) -> Result<Branch, StorageError> {
        (**self).set_last_compiled(id, at)
    }

    fn insert_merge_request(&self, request: &MergeRequest) -> Result<(), StorageError> {
        (**self).insert_merge_request(request)
    }

    fn get_merge_request(&self, id: MergeRequestId) -> Result<MergeRequest, StorageError> {
        (**self).get_merge_request(id)
    }

    fn list_merge_requests(&self, chat: &ChatId) -> Result<Vec<MergeRequest>, StorageError> {
        (**self).list_merge_requests(chat)
    }

    fn transition_merge_request(
        &self,
        id: MergeRequestId,
        next: MergeRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<MergeRequest, StorageError> {
        (**self).transition_merge_request(id, next, at)
    }

    fn complete_merge(
        &self,
        request: MergeRequestId,
        target: BranchId,
        expected_version: u64,
        new_head: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(MergeRequest, Branch), StorageError> {
        (**self).complete_merge(request, target, expected_version, new_head, at)
    }

    fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError> {
        (**self).insert_comment(comment)
    }

    fn list_comments(&self, parent: CommentParent) -> Result<Vec<Comment>, StorageError> {
        (**self).list_comments(parent)
    }
}
