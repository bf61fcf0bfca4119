//! In-memory implementation of [`VersionStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests, ephemeral sessions,
//! and anywhere persistence isn't needed. Tables are `DashMap`s; the per-key
//! entry guard is what makes `compare_and_swap_head` and
//! `transition_merge_request` atomic, with identical semantics to the SQLite
//! backend's conditional `UPDATE`s. `complete_merge` holds the request guard
//! and the branch guard together.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use chatvc_core::{
    Branch, BranchId, ChatId, Checkpoint, CheckpointId, Comment, CommentParent, MergeRequest,
    MergeRequestId, MergeRequestStatus,
};

use crate::error::StorageError;
use crate::traits::{ensure_terminal, VersionStore};

/// In-memory implementation of [`VersionStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    checkpoints: DashMap<CheckpointId, Checkpoint>,
    /// Root checkpoint of each chat.
    roots: DashMap<ChatId, CheckpointId>,
    branches: DashMap<BranchId, Branch>,
    /// Name index enforcing per-chat uniqueness.
    branch_names: DashMap<(ChatId, String), BranchId>,
    merge_requests: DashMap<MergeRequestId, MergeRequest>,
    comments: DashMap<CommentParent, Vec<Comment>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

impl VersionStore for InMemoryStore {
    // -------------------------------------------------------------------
    // Checkpoints
    // -------------------------------------------------------------------

    fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        if self.checkpoints.contains_key(&checkpoint.id) {
            return Err(StorageError::IntegrityError {
                reason: format!("checkpoint {} already exists", checkpoint.id),
            });
        }

        if checkpoint.is_root() {
            match self.roots.entry(checkpoint.chat_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::RootAlreadyExists {
                        chat: checkpoint.chat_id.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(checkpoint.id);
                }
            }
        }

        self.checkpoints.insert(checkpoint.id, checkpoint.clone());
        Ok(())
    }

    fn get_checkpoint(&self, id: CheckpointId) -> Result<Checkpoint, StorageError> {
        self.checkpoints
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::CheckpointNotFound(id))
    }

    fn list_checkpoints(&self, chat: &ChatId) -> Result<Vec<Checkpoint>, StorageError> {
        let rows: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .filter(|entry| &entry.chat_id == chat)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_creation(rows, |c| (c.created_at, c.id)))
    }

    fn count_checkpoints(&self, chat: &ChatId) -> Result<usize, StorageError> {
        Ok(self
            .checkpoints
            .iter()
            .filter(|entry| &entry.chat_id == chat)
            .count())
    }

    // -------------------------------------------------------------------
    // Branches
    // -------------------------------------------------------------------

    fn insert_branch(&self, branch: &Branch) -> Result<(), StorageError> {
        match self
            .branch_names
            .entry((branch.chat_id.clone(), branch.name.clone()))
        {
            Entry::Occupied(_) => Err(StorageError::DuplicateBranchName {
                chat: branch.chat_id.clone(),
                name: branch.name.clone(),
            }),
            Entry::Vacant(slot) => {
                self.branches.insert(branch.id, branch.clone());
                slot.insert(branch.id);
                Ok(())
            }
        }
    }

    fn get_branch(&self, id: BranchId) -> Result<Branch, StorageError> {
        self.branches
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::BranchNotFound(id))
    }

    fn find_branch_by_name(
        &self,
        chat: &ChatId,
        name: &str,
    ) -> Result<Option<Branch>, StorageError> {
        let id = match self.branch_names.get(&(chat.clone(), name.to_string())) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        self.get_branch(id).map(Some)
    }

    fn list_branches(&self, chat: &ChatId) -> Result<Vec<Branch>, StorageError> {
        let rows: Vec<Branch> = self
            .branches
            .iter()
            .filter(|entry| &entry.chat_id == chat)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_creation(rows, |b| (b.created_at, b.id)))
    }

    fn compare_and_swap_head(
        &self,
        id: BranchId,
        expected_version: u64,
        new_head: Option<CheckpointId>,
    ) -> Result<Branch, StorageError> {
        let mut entry = self
            .branches
            .get_mut(&id)
            .ok_or(StorageError::BranchNotFound(id))?;

        if entry.version != expected_version {
            return Err(StorageError::StaleBranchVersion {
                branch: id,
                expected: expected_version,
                actual: entry.version,
            });
        }

        entry.head_checkpoint_id = new_head;
        entry.version += 1;
        Ok(entry.value().clone())
    }

    fn set_last_compiled(&self, id: BranchId, at: DateTime<Utc>) -> Result<Branch, StorageError> {
        let mut entry = self
            .branches
            .get_mut(&id)
            .ok_or(StorageError::BranchNotFound(id))?;
        entry.last_compiled_at = Some(at);
        Ok(entry.value().clone())
    }

    // -------------------------------------------------------------------
    // Merge requests
    // -------------------------------------------------------------------

    fn insert_merge_request(&self, request: &MergeRequest) -> Result<(), StorageError> {
        match self.merge_requests.entry(request.id) {
            Entry::Occupied(_) => Err(StorageError::IntegrityError {
                reason: format!("merge request {} already exists", request.id),
            }),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    fn get_merge_request(&self, id: MergeRequestId) -> Result<MergeRequest, StorageError> {
        self.merge_requests
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::MergeRequestNotFound(id))
    }

    fn list_merge_requests(&self, chat: &ChatId) -> Result<Vec<MergeRequest>, StorageError> {
        let rows: Vec<MergeRequest> = self
            .merge_requests
            .iter()
            .filter(|entry| &entry.chat_id == chat)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_creation(rows, |m| (m.created_at, m.id)))
    }

    fn transition_merge_request(
        &self,
        id: MergeRequestId,
        next: MergeRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<MergeRequest, StorageError> {
        ensure_terminal(next)?;

        let mut entry = self
            .merge_requests
            .get_mut(&id)
            .ok_or(StorageError::MergeRequestNotFound(id))?;

        if !entry.status.can_transition_to(next) {
            return Err(StorageError::MergeRequestNotOpen {
                id,
                status: entry.status,
            });
        }

        entry.status = next;
        match next {
            MergeRequestStatus::Merged => entry.merged_at = Some(at),
            MergeRequestStatus::Closed => entry.closed_at = Some(at),
            MergeRequestStatus::Open => {}
        }
        Ok(entry.value().clone())
    }

    fn complete_merge(
        &self,
        request: MergeRequestId,
        target: BranchId,
        expected_version: u64,
        new_head: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(MergeRequest, Branch), StorageError> {
        // Guards are always taken request first, then branch.
        let mut mr = self
            .merge_requests
            .get_mut(&request)
            .ok_or(StorageError::MergeRequestNotFound(request))?;
        if !mr.status.can_transition_to(MergeRequestStatus::Merged) {
            return Err(StorageError::MergeRequestNotOpen {
                id: request,
                status: mr.status,
            });
        }

        let mut branch = self
            .branches
            .get_mut(&target)
            .ok_or(StorageError::BranchNotFound(target))?;
        if branch.version != expected_version {
            return Err(StorageError::StaleBranchVersion {
                branch: target,
                expected: expected_version,
                actual: branch.version,
            });
        }

        mr.status = MergeRequestStatus::Merged;
        mr.merged_at = Some(at);
        branch.head_checkpoint_id = Some(new_head);
        branch.version += 1;
        Ok((mr.value().clone(), branch.value().clone()))
    }

    // -------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------

    fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError> {
        self.comments
            .entry(comment.parent)
            .or_default()
            .push(comment.clone());
        Ok(())
    }

    fn list_comments(&self, parent: CommentParent) -> Result<Vec<Comment>, StorageError> {
        let rows = self
            .comments
            .get(&parent)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        // Stable sort keeps insertion order for equal timestamps.
        Ok(sorted_by_creation(rows, |c| c.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatvc_core::{MessageId, NewCheckpoint, NewMergeRequest};

    fn chat() -> ChatId {
        ChatId::new("chat-1")
    }

    fn root(store: &InMemoryStore) -> Checkpoint {
        let cp = NewCheckpoint::new(chat(), "alice")
            .with_label("root")
            .with_messages([MessageId::new("m1")])
            .materialize();
        store.insert_checkpoint(&cp).unwrap();
        cp
    }

    #[test]
    fn test_insert_and_get_checkpoint() {
        let store = InMemoryStore::new();
        let cp = root(&store);

        let loaded = store.get_checkpoint(cp.id).unwrap();
        assert_eq!(loaded, cp);
        assert_eq!(store.count_checkpoints(&chat()).unwrap(), 1);
        assert_eq!(store.count_checkpoints(&ChatId::new("other")).unwrap(), 0);
    }

    #[test]
    fn test_second_root_rejected() {
        let store = InMemoryStore::new();
        root(&store);

        let another = NewCheckpoint::new(chat(), "bob").materialize();
        match store.insert_checkpoint(&another).unwrap_err() {
            StorageError::RootAlreadyExists { chat: c } => assert_eq!(c, chat()),
            other => panic!("expected RootAlreadyExists, got: {:?}", other),
        }

        // A root in a different chat is fine.
        let elsewhere = NewCheckpoint::new(ChatId::new("chat-2"), "bob").materialize();
        store.insert_checkpoint(&elsewhere).unwrap();
    }

    #[test]
    fn test_missing_checkpoint() {
        let store = InMemoryStore::new();
        let id = CheckpointId::new();
        match store.get_checkpoint(id).unwrap_err() {
            StorageError::CheckpointNotFound(missing) => assert_eq!(missing, id),
            other => panic!("expected CheckpointNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_branch_name() {
        let store = InMemoryStore::new();
        store.insert_branch(&Branch::new(chat(), "main", None)).unwrap();

        let dup = Branch::new(chat(), "main", None);
        assert!(matches!(
            store.insert_branch(&dup).unwrap_err(),
            StorageError::DuplicateBranchName { .. }
        ));

        // Same name in another chat is allowed.
        store
            .insert_branch(&Branch::new(ChatId::new("chat-2"), "main", None))
            .unwrap();
        assert_eq!(store.list_branches(&chat()).unwrap().len(), 1);
    }

    #[test]
    fn test_find_branch_by_name() {
        let store = InMemoryStore::new();
        let branch = Branch::new(chat(), "feature", None);
        store.insert_branch(&branch).unwrap();

        let found = store.find_branch_by_name(&chat(), "feature").unwrap();
        assert_eq!(found.map(|b| b.id), Some(branch.id));
        assert!(store.find_branch_by_name(&chat(), "nope").unwrap().is_none());
    }

    #[test]
    fn test_compare_and_swap_head() {
        let store = InMemoryStore::new();
        let cp = root(&store);
        let branch = Branch::new(chat(), "main", None);
        store.insert_branch(&branch).unwrap();

        let updated = store.compare_and_swap_head(branch.id, 0, Some(cp.id)).unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.head_checkpoint_id, Some(cp.id));

        match store.compare_and_swap_head(branch.id, 0, None).unwrap_err() {
            StorageError::StaleBranchVersion {
                expected, actual, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected StaleBranchVersion, got: {:?}", other),
        }

        // The losing write left no trace.
        let current = store.get_branch(branch.id).unwrap();
        assert_eq!(current.head_checkpoint_id, Some(cp.id));
        assert_eq!(current.version, 1);
    }

    #[test]
    fn test_concurrent_cas_single_winner() {
        use std::sync::{Arc, Barrier};

        let store = Arc::new(InMemoryStore::new());
        let cp = root(&store);
        let branch = Branch::new(chat(), "main", None);
        store.insert_branch(&branch).unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.compare_and_swap_head(branch.id, 0, Some(cp.id)).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.get_branch(branch.id).unwrap().version, 1);
    }

    #[test]
    fn test_set_last_compiled_keeps_version() {
        let store = InMemoryStore::new();
        let branch = Branch::new(chat(), "main", None);
        store.insert_branch(&branch).unwrap();

        let at = Utc::now();
        let updated = store.set_last_compiled(branch.id, at).unwrap();
        assert_eq!(updated.last_compiled_at, Some(at));
        assert_eq!(updated.version, 0);
    }

    #[test]
    fn test_merge_request_transitions_once() {
        let store = InMemoryStore::new();
        let mr = NewMergeRequest {
            chat_id: chat(),
            source_branch_id: BranchId::new(),
            target_branch_id: BranchId::new(),
            title: "t".to_string(),
            description: String::new(),
            created_by: "alice".to_string(),
        }
        .materialize(None);
        store.insert_merge_request(&mr).unwrap();

        let at = Utc::now();
        let merged = store
            .transition_merge_request(mr.id, MergeRequestStatus::Merged, at)
            .unwrap();
        assert_eq!(merged.status, MergeRequestStatus::Merged);
        assert_eq!(merged.merged_at, Some(at));

        match store
            .transition_merge_request(mr.id, MergeRequestStatus::Closed, Utc::now())
            .unwrap_err()
        {
            StorageError::MergeRequestNotOpen { status, .. } => {
                assert_eq!(status, MergeRequestStatus::Merged)
            }
            other => panic!("expected MergeRequestNotOpen, got: {:?}", other),
        }

        assert!(matches!(
            store.transition_merge_request(mr.id, MergeRequestStatus::Open, Utc::now()),
            Err(StorageError::IntegrityError { .. })
        ));
    }

    #[test]
    fn test_complete_merge_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let base = root(&store);
        let tip = NewCheckpoint::new(chat(), "bob")
            .with_parent(base.id)
            .with_messages([MessageId::new("s1")])
            .materialize();
        store.insert_checkpoint(&tip).unwrap();

        let source = Branch::new(chat(), "feature", Some(tip.id));
        let target = Branch::new(chat(), "main", Some(base.id));
        store.insert_branch(&source).unwrap();
        store.insert_branch(&target).unwrap();
        let open = |title: &str| {
            let mr = NewMergeRequest {
                chat_id: chat(),
                source_branch_id: source.id,
                target_branch_id: target.id,
                title: title.to_string(),
                description: String::new(),
                created_by: "alice".to_string(),
            }
            .materialize(Some(base.id));
            store.insert_merge_request(&mr).unwrap();
            mr
        };

        // Stale target: the request stays open.
        let first = open("first");
        match store
            .complete_merge(first.id, target.id, 7, tip.id, Utc::now())
            .unwrap_err()
        {
            StorageError::StaleBranchVersion { expected, actual, .. } => {
                assert_eq!((expected, actual), (7, 0))
            }
            other => panic!("expected StaleBranchVersion, got: {:?}", other),
        }
        assert_eq!(
            store.get_merge_request(first.id).unwrap().status,
            MergeRequestStatus::Open
        );

        // Resolved request: the target stays put.
        store
            .transition_merge_request(first.id, MergeRequestStatus::Closed, Utc::now())
            .unwrap();
        assert!(matches!(
            store.complete_merge(first.id, target.id, 0, tip.id, Utc::now()),
            Err(StorageError::MergeRequestNotOpen {
                status: MergeRequestStatus::Closed,
                ..
            })
        ));
        let unchanged = store.get_branch(target.id).unwrap();
        assert_eq!(unchanged.head_checkpoint_id, Some(base.id));
        assert_eq!(unchanged.version, 0);

        let second = open("second");
        let at = Utc::now();
        let (merged, branch) = store
            .complete_merge(second.id, target.id, 0, tip.id, at)
            .unwrap();
        assert_eq!(merged.status, MergeRequestStatus::Merged);
        assert_eq!(merged.merged_at, Some(at));
        assert_eq!(branch.head_checkpoint_id, Some(tip.id));
        assert_eq!(branch.version, 1);
        assert_eq!(store.get_merge_request(second.id).unwrap(), merged);
    }

    #[test]
    fn test_comments_by_parent() {
        let store = InMemoryStore::new();
        let cp = root(&store);
        let parent = CommentParent::Checkpoint(cp.id);

        store.insert_comment(&Comment::new(parent, "a", "first")).unwrap();
        store.insert_comment(&Comment::new(parent, "b", "second")).unwrap();
        store
            .insert_comment(&Comment::new(
                CommentParent::MergeRequest(MergeRequestId::new()),
                "c",
                "elsewhere",
            ))
            .unwrap();

        let comments = store.list_comments(parent).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[1].content, "second");
    }
}
