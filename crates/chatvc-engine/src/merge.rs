//! Merge requests and the merge engine.
//!
//! A merge only ever moves the target branch; the source is read, never
//! written. The target head changes through one compare-and-swap against the
//! version read before any work started, and losing that swap surfaces as
//! [`VersionError::MergeConflict`]. The swap and the request's move from
//! `open` to `merged` are one store operation: either both land or neither
//! does, so a request is merged at most once and never after its target moved.
//!
//! A source whose head is already reachable from the target head has nothing
//! to contribute; such merges are rejected with
//! [`VersionError::NothingToMerge`] and the request stays open.

use chrono::Utc;

use chatvc_core::{
    Branch, BranchId, ChatId, CheckpointId, MergeRequest, MergeRequestId, MergeRequestStatus,
    NewCheckpoint, NewMergeRequest, Strategy,
};
use chatvc_storage::{StorageError, VersionStore};

use crate::error::VersionError;
use crate::VersionEngine;

impl<S: VersionStore> VersionEngine<S> {
    /// Opens a merge request from `source` into `target`.
    ///
    /// The divergence point is the lowest common ancestor of the two heads at
    /// this moment, or none if either branch is headless.
    pub fn create_merge_request(
        &self,
        new: NewMergeRequest,
    ) -> Result<MergeRequest, VersionError> {
        if new.source_branch_id == new.target_branch_id {
            return Err(VersionError::InvalidRequest(
                "source and target branch must differ".to_string(),
            ));
        }
        if new.title.trim().is_empty() {
            return Err(VersionError::InvalidRequest(
                "merge request title must not be empty".to_string(),
            ));
        }

        let source = self.branch_of_chat(new.source_branch_id, &new.chat_id)?;
        let target = self.branch_of_chat(new.target_branch_id, &new.chat_id)?;

        let divergence = match (source.head_checkpoint_id, target.head_checkpoint_id) {
            (Some(s), Some(t)) => self.lowest_common_ancestor(s, t)?.map(|lca| lca.id),
            _ => None,
        };

        let request = new.materialize(divergence);
        self.store.insert_merge_request(&request)?;
        tracing::info!(
            "opened merge request {} ('{}' -> '{}')",
            request.id,
            source.name,
            target.name
        );
        Ok(request)
    }

    pub fn get_merge_request(&self, id: MergeRequestId) -> Result<MergeRequest, VersionError> {
        Ok(self.store.get_merge_request(id)?)
    }

    pub fn list_merge_requests(&self, chat: &ChatId) -> Result<Vec<MergeRequest>, VersionError> {
        Ok(self.store.list_merge_requests(chat)?)
    }

    /// Closes an open merge request without merging.
    pub fn close_merge_request(&self, id: MergeRequestId) -> Result<MergeRequest, VersionError> {
        let closed = self
            .store
            .transition_merge_request(id, MergeRequestStatus::Closed, Utc::now())?;
        tracing::info!("closed merge request {}", id);
        Ok(closed)
    }

    /// Integrates the source branch into the target branch.
    pub fn merge(
        &self,
        id: MergeRequestId,
        strategy: Strategy,
        author: &str,
    ) -> Result<MergeRequest, VersionError> {
        let request = self.store.get_merge_request(id)?;
        if !request.is_open() {
            return Err(VersionError::AlreadyResolved {
                id,
                status: request.status,
            });
        }

        let source = self.store.get_branch(request.source_branch_id)?;
        let target = self.store.get_branch(request.target_branch_id)?;
        let expected = target.version;

        let source_head = source
            .head_checkpoint_id
            .ok_or(VersionError::EmptyBranch { branch: source.id })?;

        let lca = match target.head_checkpoint_id {
            Some(target_head) => self.lowest_common_ancestor(source_head, target_head)?,
            None => None,
        };

        if let Some(target_head) = target.head_checkpoint_id {
            if self.is_ancestor(source_head, target_head)? {
                // A concurrent merge of this request may be what moved the target.
                let current = self.store.get_merge_request(id)?;
                if !current.is_open() {
                    return Err(VersionError::AlreadyResolved {
                        id,
                        status: current.status,
                    });
                }
                return Err(VersionError::NothingToMerge {
                    id,
                    source_branch: source.id,
                    target_branch: target.id,
                });
            }
        }

        tracing::debug!(
            "merge request {}: source head {}, target head {:?}, lca {:?}",
            id,
            source_head,
            target.head_checkpoint_id,
            lca.as_ref().map(|c| c.id)
        );

        let new_head = match strategy {
            Strategy::FastForward => {
                if let Some(target_head) = target.head_checkpoint_id {
                    if !self.is_ancestor(target_head, source_head)? {
                        return Err(VersionError::InvalidStrategy {
                            strategy,
                            reason: format!(
                                "target '{}' has diverged from '{}'; use squash or rebase",
                                target.name, source.name
                            ),
                        });
                    }
                }
                source_head
            }
            Strategy::Squash => {
                let target_head =
                    require_target_head(&target.name, target.head_checkpoint_id, strategy)?;
                let base = self.store.get_checkpoint(target_head)?;
                let (tail, messages) = self.divergent_messages(source_head, &base)?;
                // Second parent is the contributing source head; the compiler
                // emits the restated source messages once.
                let merged = self.insert_checkpoint(
                    NewCheckpoint::new(target.chat_id.clone(), author)
                        .with_parents([target_head, source_head])
                        .with_label(format!("Merge '{}' into '{}'", source.name, target.name))
                        .with_comment(format!(
                            "{} ({} checkpoint(s) squashed)",
                            request.title,
                            tail.len()
                        ))
                        .with_messages(messages),
                )?;
                merged.id
            }
            Strategy::Rebase => {
                let target_head =
                    require_target_head(&target.name, target.head_checkpoint_id, strategy)?;
                let base = self.store.get_checkpoint(target_head)?;
                let tail = self.compiled_tail(source_head, Some(target_head))?;
                self.replay_onto(&base, tail)?
            }
        };

        let (merged, _) = match self.store.complete_merge(
            id,
            target.id,
            expected,
            new_head,
            Utc::now(),
        ) {
            Ok(done) => done,
            Err(StorageError::StaleBranchVersion { actual, .. }) => {
                tracing::warn!(
                    "merge request {}: target '{}' moved from version {} to {}",
                    id,
                    target.name,
                    expected,
                    actual
                );
                return Err(VersionError::MergeConflict {
                    id,
                    target: target.id,
                });
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            "merged request {} into '{}' with {} (head {})",
            id,
            target.name,
            strategy,
            new_head
        );
        Ok(merged)
    }

    /// Loads a branch that must belong to `chat`; anything else is an
    /// unknown reference.
    fn branch_of_chat(
        &self,
        id: BranchId,
        chat: &ChatId,
    ) -> Result<Branch, VersionError> {
        match self.store.get_branch(id) {
            Ok(branch) if &branch.chat_id == chat => Ok(branch),
            Ok(_) | Err(StorageError::BranchNotFound(_)) => Err(VersionError::UnknownParent {
                entity: "branch",
                id: id.to_string(),
                chat: chat.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

fn require_target_head(
    target_name: &str,
    head: Option<CheckpointId>,
    strategy: Strategy,
) -> Result<CheckpointId, VersionError> {
    head.ok_or_else(|| VersionError::InvalidStrategy {
        strategy,
        reason: format!("target '{}' is empty; only fast-forward applies", target_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chat, commit, engine, msgs};
    use chatvc_core::{Checkpoint, MessageId};
    use chatvc_storage::InMemoryStore;

    struct Fork {
        source: Branch,
        target: Branch,
        root: Checkpoint,
    }

    /// main: root; feature: root -> s1 -> s2
    fn fork(engine: &VersionEngine<InMemoryStore>) -> Fork {
        let target = engine.create_branch(&chat(), "main", None).unwrap();
        let root = commit(engine, &target, "root", &["m0"]);
        let source = engine.create_branch(&chat(), "feature", Some(root.id)).unwrap();
        commit(engine, &source, "s1", &["s1"]);
        commit(engine, &source, "s2", &["s2a", "s2b"]);
        Fork {
            source: engine.get_branch(source.id).unwrap(),
            target: engine.get_branch(target.id).unwrap(),
            root,
        }
    }

    fn open(engine: &VersionEngine<InMemoryStore>, source: BranchId, target: BranchId) -> MergeRequest {
        engine
            .create_merge_request(NewMergeRequest {
                chat_id: chat(),
                source_branch_id: source,
                target_branch_id: target,
                title: "fold feature".to_string(),
                description: String::new(),
                created_by: "alice".to_string(),
            })
            .unwrap()
    }

    fn compiled(engine: &VersionEngine<InMemoryStore>, branch: BranchId) -> Vec<String> {
        engine
            .compile(branch)
            .unwrap()
            .messages
            .into_iter()
            .map(|m: MessageId| m.0)
            .collect()
    }

    #[test]
    fn test_create_merge_request_records_divergence() {
        let engine = engine();
        let f = fork(&engine);
        let mr = open(&engine, f.source.id, f.target.id);
        assert!(mr.is_open());
        assert_eq!(mr.divergence_point_checkpoint_id, Some(f.root.id));
        assert_eq!(engine.list_merge_requests(&chat()).unwrap().len(), 1);
    }

    #[test]
    fn test_create_merge_request_validation() {
        let engine = engine();
        let f = fork(&engine);

        let same = engine.create_merge_request(NewMergeRequest {
            chat_id: chat(),
            source_branch_id: f.source.id,
            target_branch_id: f.source.id,
            title: "self".to_string(),
            description: String::new(),
            created_by: "a".to_string(),
        });
        assert!(matches!(same, Err(VersionError::InvalidRequest(_))));

        let foreign = engine.create_merge_request(NewMergeRequest {
            chat_id: ChatId::new("chat-2"),
            source_branch_id: f.source.id,
            target_branch_id: f.target.id,
            title: "wrong chat".to_string(),
            description: String::new(),
            created_by: "a".to_string(),
        });
        assert!(matches!(foreign, Err(VersionError::UnknownParent { .. })));
    }

    #[test]
    fn test_fast_forward_merge_scenario() {
        let engine = engine();
        let f = fork(&engine);
        let mr = open(&engine, f.source.id, f.target.id);
        let before = engine.store().count_checkpoints(&chat()).unwrap();

        let merged = engine.merge(mr.id, Strategy::FastForward, "bob").unwrap();
        assert_eq!(merged.status, MergeRequestStatus::Merged);
        assert!(merged.merged_at.is_some());

        let target = engine.get_branch(f.target.id).unwrap();
        assert_eq!(target.head_checkpoint_id, f.source.head_checkpoint_id);
        assert_eq!(target.version, f.target.version + 1);
        assert_eq!(engine.store().count_checkpoints(&chat()).unwrap(), before);

        // The source is never written.
        assert_eq!(engine.get_branch(f.source.id).unwrap(), f.source);
    }

    #[test]
    fn test_fast_forward_into_empty_target() {
        let engine = engine();
        let f = fork(&engine);
        let empty = engine.create_branch(&chat(), "empty", None).unwrap();
        let mr = open(&engine, f.source.id, empty.id);
        assert_eq!(mr.divergence_point_checkpoint_id, None);

        engine.merge(mr.id, Strategy::FastForward, "bob").unwrap();
        let empty = engine.get_branch(empty.id).unwrap();
        assert_eq!(empty.head_checkpoint_id, f.source.head_checkpoint_id);
    }

    #[test]
    fn test_squash_and_rebase_need_target_head() {
        let engine = engine();
        let f = fork(&engine);
        let empty = engine.create_branch(&chat(), "empty", None).unwrap();
        let mr = open(&engine, f.source.id, empty.id);

        for strategy in [Strategy::Squash, Strategy::Rebase] {
            assert!(matches!(
                engine.merge(mr.id, strategy, "bob"),
                Err(VersionError::InvalidStrategy { .. })
            ));
        }
        assert!(engine.get_merge_request(mr.id).unwrap().is_open());
    }

    #[test]
    fn test_fast_forward_rejected_after_divergence() {
        let engine = engine();
        let f = fork(&engine);
        commit(&engine, &f.target, "t1", &["t1"]);
        let mr = open(&engine, f.source.id, f.target.id);

        let err = engine.merge(mr.id, Strategy::FastForward, "bob").unwrap_err();
        assert!(matches!(err, VersionError::InvalidStrategy { .. }));
        assert!(engine.get_merge_request(mr.id).unwrap().is_open());
    }

    #[test]
    fn test_squash_merge_creates_two_parent_commit() {
        let engine = engine();
        let f = fork(&engine);
        let t1 = commit(&engine, &f.target, "t1", &["t1"]);
        let mr = open(&engine, f.source.id, f.target.id);

        engine.merge(mr.id, Strategy::Squash, "bob").unwrap();
        let target = engine.get_branch(f.target.id).unwrap();
        let merge = engine.get_checkpoint(target.head_checkpoint_id.unwrap()).unwrap();

        assert_eq!(
            merge.parent_checkpoint_ids.as_slice(),
            &[t1.id, f.source.head_checkpoint_id.unwrap()]
        );
        assert_eq!(merge.message_ids, msgs(&["s1", "s2a", "s2b"]));
        assert_eq!(merge.created_by, "bob");

        let messages = compiled(&engine, f.target.id);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], "m0");
        for expected in ["t1", "s1", "s2a", "s2b"] {
            assert!(messages.iter().any(|m| m == expected));
        }
    }

    #[test]
    fn test_rebase_merge_replays_source_tail() {
        let engine = engine();
        let f = fork(&engine);
        let t1 = commit(&engine, &f.target, "t1", &["t1"]);
        let mr = open(&engine, f.source.id, f.target.id);

        engine.merge(mr.id, Strategy::Rebase, "bob").unwrap();
        let target = engine.get_branch(f.target.id).unwrap();
        let tip = engine.get_checkpoint(target.head_checkpoint_id.unwrap()).unwrap();
        assert_eq!(tip.label, "s2");
        assert!(!tip.is_merge());

        let first = engine.get_checkpoint(tip.first_parent().unwrap()).unwrap();
        assert_eq!(first.label, "s1");
        assert_eq!(first.parent_checkpoint_ids.as_slice(), &[t1.id]);

        assert_eq!(compiled(&engine, f.target.id), vec!["m0", "t1", "s1", "s2a", "s2b"]);
    }

    #[test]
    fn test_second_merge_is_already_resolved() {
        let engine = engine();
        let f = fork(&engine);
        let mr = open(&engine, f.source.id, f.target.id);
        engine.merge(mr.id, Strategy::FastForward, "bob").unwrap();
        let after_first = engine.get_branch(f.target.id).unwrap();

        for strategy in Strategy::ALL {
            match engine.merge(mr.id, strategy, "bob").unwrap_err() {
                VersionError::AlreadyResolved { status, .. } => {
                    assert_eq!(status, MergeRequestStatus::Merged)
                }
                other => panic!("expected AlreadyResolved, got: {:?}", other),
            }
        }
        assert_eq!(engine.get_branch(f.target.id).unwrap(), after_first);
    }

    fn assert_nothing_to_merge(
        engine: &VersionEngine<InMemoryStore>,
        source: BranchId,
        target: BranchId,
    ) {
        let mr = open(engine, source, target);
        let before = engine.get_branch(target).unwrap();
        let checkpoints = engine.store().count_checkpoints(&chat()).unwrap();

        for strategy in Strategy::ALL {
            match engine.merge(mr.id, strategy, "bob").unwrap_err() {
                VersionError::NothingToMerge {
                    source_branch,
                    target_branch,
                    ..
                } => {
                    assert_eq!(source_branch, source);
                    assert_eq!(target_branch, target);
                }
                other => panic!("expected NothingToMerge, got: {:?}", other),
            }
        }
        assert!(engine.get_merge_request(mr.id).unwrap().is_open());
        assert_eq!(engine.get_branch(target).unwrap(), before);
        assert_eq!(engine.store().count_checkpoints(&chat()).unwrap(), checkpoints);
    }

    #[test]
    fn test_merge_with_nothing_new_is_rejected() {
        let engine = engine();
        let f = fork(&engine);

        // Same head as main.
        let idle = engine
            .create_branch(&chat(), "idle", f.target.head_checkpoint_id)
            .unwrap();
        assert_nothing_to_merge(&engine, idle.id, f.target.id);

        // Head is an ancestor of main's head.
        commit(&engine, &f.target, "t1", &["t1"]);
        assert_nothing_to_merge(&engine, idle.id, f.target.id);
    }

    #[test]
    fn test_merge_back_after_fast_forward_has_nothing_new() {
        let engine = engine();
        let f = fork(&engine);
        let mr = open(&engine, f.source.id, f.target.id);
        engine.merge(mr.id, Strategy::FastForward, "bob").unwrap();

        // Both heads are now the same checkpoint.
        let back = open(&engine, f.target.id, f.source.id);
        assert!(matches!(
            engine.merge(back.id, Strategy::Squash, "bob"),
            Err(VersionError::NothingToMerge { .. })
        ));
        assert_eq!(engine.get_branch(f.source.id).unwrap(), f.source);
        assert!(engine.close_merge_request(back.id).is_ok());
    }

    #[test]
    fn test_close_merge_request() {
        let engine = engine();
        let f = fork(&engine);
        let mr = open(&engine, f.source.id, f.target.id);

        let closed = engine.close_merge_request(mr.id).unwrap();
        assert_eq!(closed.status, MergeRequestStatus::Closed);
        assert!(closed.closed_at.is_some());

        assert!(matches!(
            engine.close_merge_request(mr.id),
            Err(VersionError::AlreadyResolved { .. })
        ));
        assert!(matches!(
            engine.merge(mr.id, Strategy::FastForward, "bob"),
            Err(VersionError::AlreadyResolved { .. })
        ));
    }

    #[test]
    fn test_merge_with_empty_source() {
        let engine = engine();
        let f = fork(&engine);
        let empty = engine.create_branch(&chat(), "empty", None).unwrap();
        let mr = open(&engine, empty.id, f.target.id);
        assert!(matches!(
            engine.merge(mr.id, Strategy::FastForward, "bob"),
            Err(VersionError::EmptyBranch { .. })
        ));
    }

    #[test]
    fn test_merge_missing_request() {
        let engine = engine();
        assert!(matches!(
            engine.merge(MergeRequestId::new(), Strategy::Squash, "bob"),
            Err(VersionError::NotFound { .. })
        ));
    }
}
