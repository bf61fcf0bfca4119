//! Checkpoint creation and traversal of the checkpoint DAG.
//!
//! Checkpoints are insert-only. A chat has exactly one root (the first
//! checkpoint ever created in it); every later checkpoint names one parent,
//! or two for a merge. Parents must already exist in the same chat, so the
//! parent links cannot form a cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use chatvc_core::checkpoint::MAX_PARENTS;
use chatvc_core::{Branch, BranchId, ChatId, Checkpoint, CheckpointId, MessageId, NewCheckpoint};
use chatvc_storage::{StorageError, VersionStore};

use crate::error::VersionError;
use crate::VersionEngine;

/// Input for capturing new messages on top of a branch.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub branch_id: BranchId,
    pub label: String,
    pub comment: String,
    /// Newly captured messages, in original creation order.
    pub message_ids: Vec<MessageId>,
    pub author: String,
    /// Version the caller last observed. Defaults to the version read at the
    /// start of the commit.
    pub expected_version: Option<u64>,
}

/// The new checkpoint and the branch now pointing at it.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub checkpoint: Checkpoint,
    pub branch: Branch,
}

/// Lazy breadth-first walk over the ancestors of a checkpoint.
///
/// The start checkpoint is not yielded; every ancestor is yielded once even
/// when reachable along several paths. After an error the walk ends.
pub struct Ancestors<'a, S> {
    store: &'a S,
    queue: VecDeque<CheckpointId>,
    seen: HashSet<CheckpointId>,
}

impl<'a, S: VersionStore> Ancestors<'a, S> {
    fn from_checkpoint(store: &'a S, start: &Checkpoint) -> Self {
        let mut walk = Ancestors {
            store,
            queue: VecDeque::new(),
            seen: HashSet::from([start.id]),
        };
        walk.enqueue_parents(start);
        walk
    }

    fn enqueue_parents(&mut self, checkpoint: &Checkpoint) {
        for parent in &checkpoint.parent_checkpoint_ids {
            if self.seen.insert(*parent) {
                self.queue.push_back(*parent);
            }
        }
    }
}

impl<S: VersionStore> Iterator for Ancestors<'_, S> {
    type Item = Result<Checkpoint, VersionError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        match self.store.get_checkpoint(id) {
            Ok(checkpoint) => {
                self.enqueue_parents(&checkpoint);
                Some(Ok(checkpoint))
            }
            Err(err) => {
                self.queue.clear();
                Some(Err(err.into()))
            }
        }
    }
}

impl<S: VersionStore> VersionEngine<S> {
    /// Creates a checkpoint with explicit parents.
    ///
    /// Parents must exist in the same chat. A parentless checkpoint is only
    /// accepted while the chat has no root yet. The new messages must not
    /// already be captured by any checkpoint reachable from the parents.
    pub fn create_checkpoint(&self, new: NewCheckpoint) -> Result<Checkpoint, VersionError> {
        let parents = &new.parent_checkpoint_ids;
        if parents.len() > MAX_PARENTS {
            return Err(VersionError::InvalidRequest(format!(
                "a checkpoint has at most {} parents, got {}",
                MAX_PARENTS,
                parents.len()
            )));
        }
        if parents.len() == 2 && parents[0] == parents[1] {
            return Err(VersionError::InvalidRequest(
                "merge parents must be distinct".to_string(),
            ));
        }
        for parent in parents {
            self.checkpoint_in_chat(*parent, &new.chat_id)?;
        }

        let captured = self.captured_messages(parents.iter().copied())?;
        ensure_disjoint(&captured, &new.message_ids)?;

        self.insert_checkpoint(new)
    }

    /// Retrieves a checkpoint by id.
    pub fn get_checkpoint(&self, id: CheckpointId) -> Result<Checkpoint, VersionError> {
        Ok(self.store.get_checkpoint(id)?)
    }

    /// Lazily walks the ancestors of `id`, breadth-first, excluding `id`.
    pub fn ancestors(&self, id: CheckpointId) -> Result<Ancestors<'_, S>, VersionError> {
        let start = self.store.get_checkpoint(id)?;
        Ok(Ancestors::from_checkpoint(&self.store, &start))
    }

    /// True if `candidate` is `of` or one of its ancestors.
    pub fn is_ancestor(
        &self,
        candidate: CheckpointId,
        of: CheckpointId,
    ) -> Result<bool, VersionError> {
        self.store.get_checkpoint(candidate)?;
        if candidate == of {
            self.store.get_checkpoint(of)?;
            return Ok(true);
        }
        for ancestor in self.ancestors(of)? {
            if ancestor?.id == candidate {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Nearest checkpoint reachable from both `a` and `b`.
    ///
    /// Both sides are expanded one BFS level at a time, alternating; the
    /// first checkpoint reached by one frontier that the other has already
    /// visited wins. Returns `None` for unrelated histories.
    pub fn lowest_common_ancestor(
        &self,
        a: CheckpointId,
        b: CheckpointId,
    ) -> Result<Option<Checkpoint>, VersionError> {
        if a == b {
            return self.get_checkpoint(a).map(Some);
        }

        let mut seen_a = HashSet::from([a]);
        let mut seen_b = HashSet::from([b]);
        let mut frontier_a = vec![a];
        let mut frontier_b = vec![b];

        while !frontier_a.is_empty() || !frontier_b.is_empty() {
            if let Some(hit) = self.expand_level(&mut frontier_a, &mut seen_a, &seen_b)? {
                return self.get_checkpoint(hit).map(Some);
            }
            if let Some(hit) = self.expand_level(&mut frontier_b, &mut seen_b, &seen_a)? {
                return self.get_checkpoint(hit).map(Some);
            }
        }
        Ok(None)
    }

    /// Captures messages on top of a branch and moves its head to the new
    /// checkpoint.
    pub fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, VersionError> {
        let branch = self.store.get_branch(request.branch_id)?;
        let expected = request.expected_version.unwrap_or(branch.version);
        ensure_version(&branch, expected)?;

        let captured = self.captured_messages(branch.head_checkpoint_id)?;
        ensure_disjoint(&captured, &request.message_ids)?;

        let mut new = NewCheckpoint::new(branch.chat_id.clone(), request.author)
            .with_label(request.label)
            .with_comment(request.comment)
            .with_messages(request.message_ids);
        if let Some(head) = branch.head_checkpoint_id {
            new = new.with_parent(head);
        }

        let checkpoint = match self.insert_checkpoint(new) {
            Ok(checkpoint) => checkpoint,
            // Two writers racing for the root of an empty branch: report the
            // loser as stale if the branch moved underneath it.
            Err(VersionError::EmptyLineage { chat }) => {
                let current = self.store.get_branch(branch.id)?;
                ensure_version(&current, expected)?;
                return Err(VersionError::EmptyLineage { chat });
            }
            Err(err) => return Err(err),
        };

        let branch = self.swap_head(&branch, expected, Some(checkpoint.id))?;
        Ok(CommitOutcome { checkpoint, branch })
    }

    // -----------------------------------------------------------------------
    // Crate-internal helpers
    // -----------------------------------------------------------------------

    /// Materializes and stores a checkpoint without lineage checks.
    pub(crate) fn insert_checkpoint(&self, new: NewCheckpoint) -> Result<Checkpoint, VersionError> {
        let checkpoint = new.materialize();
        self.store.insert_checkpoint(&checkpoint)?;
        tracing::debug!(
            "created checkpoint {} in chat {} ({} parent(s), {} message(s))",
            checkpoint.id,
            checkpoint.chat_id,
            checkpoint.parent_checkpoint_ids.len(),
            checkpoint.message_ids.len()
        );
        Ok(checkpoint)
    }

    /// Loads a checkpoint that must belong to `chat`.
    pub(crate) fn checkpoint_in_chat(
        &self,
        id: CheckpointId,
        chat: &ChatId,
    ) -> Result<Checkpoint, VersionError> {
        match self.store.get_checkpoint(id) {
            Ok(checkpoint) if &checkpoint.chat_id == chat => Ok(checkpoint),
            Ok(_) | Err(StorageError::CheckpointNotFound(_)) => Err(VersionError::UnknownParent {
                entity: "checkpoint",
                id: id.to_string(),
                chat: chat.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Every checkpoint reachable from `head`, including `head`.
    pub(crate) fn reachable(
        &self,
        head: CheckpointId,
    ) -> Result<HashMap<CheckpointId, Checkpoint>, VersionError> {
        let start = self.store.get_checkpoint(head)?;
        let mut out = HashMap::new();
        for ancestor in Ancestors::from_checkpoint(&self.store, &start) {
            let ancestor = ancestor?;
            out.insert(ancestor.id, ancestor);
        }
        out.insert(start.id, start);
        Ok(out)
    }

    /// Union of the message ids captured by everything reachable from `heads`.
    pub(crate) fn captured_messages(
        &self,
        heads: impl IntoIterator<Item = CheckpointId>,
    ) -> Result<HashSet<MessageId>, VersionError> {
        let mut captured = HashSet::new();
        for head in heads {
            for checkpoint in self.reachable(head)?.into_values() {
                captured.extend(checkpoint.message_ids);
            }
        }
        Ok(captured)
    }

    /// Expands one BFS level; returns the first parent already seen by the
    /// other side.
    fn expand_level(
        &self,
        frontier: &mut Vec<CheckpointId>,
        seen: &mut HashSet<CheckpointId>,
        other: &HashSet<CheckpointId>,
    ) -> Result<Option<CheckpointId>, VersionError> {
        let mut next = Vec::new();
        for id in frontier.drain(..) {
            let checkpoint = self.store.get_checkpoint(id)?;
            for parent in checkpoint.parent_checkpoint_ids {
                if seen.insert(parent) {
                    if other.contains(&parent) {
                        return Ok(Some(parent));
                    }
                    next.push(parent);
                }
            }
        }
        *frontier = next;
        Ok(None)
    }
}

/// Rejects a stale caller-supplied version before any checkpoint is written.
pub(crate) fn ensure_version(branch: &Branch, expected: u64) -> Result<(), VersionError> {
    if branch.version == expected {
        Ok(())
    } else {
        Err(VersionError::StaleHead {
            branch: branch.id,
            expected,
            actual: branch.version,
        })
    }
}

/// Rejects messages already captured in the lineage, or repeated in `new`.
pub(crate) fn ensure_disjoint(
    captured: &HashSet<MessageId>,
    new: &[MessageId],
) -> Result<(), VersionError> {
    let mut fresh = HashSet::with_capacity(new.len());
    for message in new {
        if captured.contains(message) || !fresh.insert(message) {
            return Err(VersionError::MessageAlreadyCaptured {
                message: message.clone(),
            });
        }
    }
    Ok(())
}
