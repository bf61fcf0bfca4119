//! Restoring a branch onto another checkpoint of its chat.
//!
//! No checkpoint is ever rewritten: moving a head "back" creates new forward
//! history (squash, rebase) or repoints the head along existing ancestry
//! (fast-forward). The head move is one compare-and-swap against the version
//! read at the start; checkpoints written before a lost swap stay orphaned.

use std::collections::HashSet;

use indexmap::IndexSet;

use chatvc_core::{Branch, BranchId, Checkpoint, CheckpointId, MessageId, NewCheckpoint, Strategy};
use chatvc_storage::VersionStore;

use crate::checkpoints::ensure_version;
use crate::error::VersionError;
use crate::VersionEngine;

pub const SQUASHED_RESTORE_LABEL: &str = "Squashed restore";

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub branch_id: BranchId,
    pub target_checkpoint_id: CheckpointId,
    pub strategy: Strategy,
    /// Recorded as `created_by` on checkpoints the restore writes.
    pub author: String,
    pub expected_version: Option<u64>,
}

impl<S: VersionStore> VersionEngine<S> {
    /// Moves a branch head onto `target_checkpoint_id` using `strategy`.
    pub fn restore(&self, request: RestoreRequest) -> Result<Branch, VersionError> {
        let branch = self.store.get_branch(request.branch_id)?;
        let expected = request.expected_version.unwrap_or(branch.version);
        ensure_version(&branch, expected)?;

        let target = self.checkpoint_in_chat(request.target_checkpoint_id, &branch.chat_id)?;
        let head = branch
            .head_checkpoint_id
            .ok_or(VersionError::EmptyBranch { branch: branch.id })?;

        let new_head = match request.strategy {
            Strategy::FastForward => {
                if !self.is_ancestor(target.id, head)? {
                    return Err(VersionError::InvalidStrategy {
                        strategy: Strategy::FastForward,
                        reason: format!(
                            "checkpoint {} is not an ancestor of head {}; use squash or rebase",
                            target.id, head
                        ),
                    });
                }
                target.id
            }
            Strategy::Squash => {
                let (tail, messages) = self.divergent_messages(head, &target)?;
                let squashed = self.insert_checkpoint(
                    NewCheckpoint::new(branch.chat_id.clone(), request.author.as_str())
                        .with_parent(target.id)
                        .with_label(SQUASHED_RESTORE_LABEL)
                        .with_comment(format!(
                            "Folded {} checkpoint(s) from {} onto {}",
                            tail.len(),
                            head,
                            target.id
                        ))
                        .with_messages(messages),
                )?;
                squashed.id
            }
            Strategy::Rebase => {
                let tail = self.compiled_tail(head, Some(target.id))?;
                self.replay_onto(&target, tail)?
            }
        };

        tracing::info!(
            "restoring branch '{}' onto {} with {}",
            branch.name,
            target.id,
            request.strategy
        );
        self.swap_head(&branch, expected, Some(new_head))
    }

    /// Checkpoints reachable from `head` but not from `base` (compiled
    /// order), and their messages not already captured under `base`.
    pub(crate) fn divergent_messages(
        &self,
        head: CheckpointId,
        base: &Checkpoint,
    ) -> Result<(Vec<Checkpoint>, Vec<MessageId>), VersionError> {
        let tail = self.compiled_tail(head, Some(base.id))?;
        let captured = self.captured_messages([base.id])?;
        let messages: IndexSet<MessageId> = tail
            .iter()
            .flat_map(|checkpoint| checkpoint.message_ids.iter())
            .filter(|message| !captured.contains(*message))
            .cloned()
            .collect();
        Ok((tail, messages.into_iter().collect()))
    }

    /// Re-creates `tail` one checkpoint at a time, chained onto `onto`.
    ///
    /// Label, comment, author and messages are carried over; messages already
    /// captured on the new lineage are dropped. Returns the new tip, which is
    /// `onto` itself for an empty tail.
    pub(crate) fn replay_onto(
        &self,
        onto: &Checkpoint,
        tail: Vec<Checkpoint>,
    ) -> Result<CheckpointId, VersionError> {
        let mut captured: HashSet<MessageId> = self.captured_messages([onto.id])?;
        let mut tip = onto.id;
        for original in tail {
            let messages: Vec<MessageId> = original
                .message_ids
                .into_iter()
                .filter(|message| captured.insert(message.clone()))
                .collect();
            let replayed = self.insert_checkpoint(
                NewCheckpoint::new(onto.chat_id.clone(), original.created_by)
                    .with_parent(tip)
                    .with_label(original.label)
                    .with_comment(original.comment)
                    .with_messages(messages),
            )?;
            tracing::debug!("replayed checkpoint {} as {}", original.id, replayed.id);
            tip = replayed.id;
        }
        Ok(tip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chat, commit, engine, msgs};
    use chatvc_core::ChatId;
    use chatvc_storage::InMemoryStore;
    use proptest::prelude::{prop, prop_assert, proptest, ProptestConfig};

    struct Linear {
        branch: Branch,
        root: Checkpoint,
        c1: Checkpoint,
        c2: Checkpoint,
        c3: Checkpoint,
    }

    /// main: root -> c1 -> c2 -> c3
    fn linear(engine: &VersionEngine<InMemoryStore>) -> Linear {
        let branch = engine.create_branch(&chat(), "main", None).unwrap();
        let root = commit(engine, &branch, "root", &["m0"]);
        let c1 = commit(engine, &branch, "c1", &["m1"]);
        let c2 = commit(engine, &branch, "c2", &["m2a", "m2b"]);
        let c3 = commit(engine, &branch, "c3", &["m3"]);
        let branch = engine.get_branch(branch.id).unwrap();
        Linear {
            branch,
            root,
            c1,
            c2,
            c3,
        }
    }

    fn request(branch: BranchId, target: CheckpointId, strategy: Strategy) -> RestoreRequest {
        RestoreRequest {
            branch_id: branch,
            target_checkpoint_id: target,
            strategy,
            author: "alice".to_string(),
            expected_version: None,
        }
    }

    fn compiled(engine: &VersionEngine<InMemoryStore>, branch: BranchId) -> Vec<String> {
        engine
            .compile(branch)
            .unwrap()
            .messages
            .into_iter()
            .map(|m| m.0)
            .collect()
    }

    #[test]
    fn test_squash_restore_scenario() {
        let engine = engine();
        let l = linear(&engine);
        let before = engine.store().count_checkpoints(&chat()).unwrap();

        let branch = engine
            .restore(request(l.branch.id, l.c1.id, Strategy::Squash))
            .unwrap();
        let c4 = engine.get_checkpoint(branch.head_checkpoint_id.unwrap()).unwrap();

        assert_eq!(c4.parent_checkpoint_ids.as_slice(), &[l.c1.id]);
        assert_eq!(c4.label, SQUASHED_RESTORE_LABEL);
        assert_eq!(c4.created_by, "alice");
        assert_eq!(c4.message_ids, msgs(&["m2a", "m2b", "m3"]));
        assert!(engine.is_ancestor(l.c1.id, c4.id).unwrap());
        assert!(!engine.is_ancestor(l.c2.id, c4.id).unwrap());
        assert_eq!(branch.version, l.branch.version + 1);
        assert_eq!(engine.store().count_checkpoints(&chat()).unwrap(), before + 1);

        assert_eq!(compiled(&engine, branch.id), vec!["m0", "m1", "m2a", "m2b", "m3"]);
    }

    #[test]
    fn test_squash_restore_sideways() {
        let engine = engine();
        let l = linear(&engine);
        let side = engine.create_branch(&chat(), "side", Some(l.c1.id)).unwrap();
        let f1 = commit(&engine, &side, "f1", &["f1"]);

        let branch = engine
            .restore(request(l.branch.id, f1.id, Strategy::Squash))
            .unwrap();
        let head = engine.get_checkpoint(branch.head_checkpoint_id.unwrap()).unwrap();
        assert_eq!(head.parent_checkpoint_ids.as_slice(), &[f1.id]);
        assert_eq!(compiled(&engine, branch.id), vec!["m0", "m1", "f1", "m2a", "m2b", "m3"]);
    }

    #[test]
    fn test_fast_forward_restore_to_ancestor() {
        let engine = engine();
        let l = linear(&engine);
        let before = engine.store().count_checkpoints(&chat()).unwrap();

        let branch = engine
            .restore(request(l.branch.id, l.root.id, Strategy::FastForward))
            .unwrap();
        assert_eq!(branch.head_checkpoint_id, Some(l.root.id));
        assert_eq!(engine.store().count_checkpoints(&chat()).unwrap(), before);
        assert_eq!(compiled(&engine, branch.id), vec!["m0"]);

        // The old head is no longer an ancestor of the new one.
        let err = engine
            .restore(request(l.branch.id, l.c3.id, Strategy::FastForward))
            .unwrap_err();
        match err {
            VersionError::InvalidStrategy { strategy, .. } => {
                assert_eq!(strategy, Strategy::FastForward)
            }
            other => panic!("expected InvalidStrategy, got: {:?}", other),
        }
    }

    #[test]
    fn test_fast_forward_restore_to_head_is_noop_move() {
        let engine = engine();
        let l = linear(&engine);
        let branch = engine
            .restore(request(l.branch.id, l.c3.id, Strategy::FastForward))
            .unwrap();
        assert_eq!(branch.head_checkpoint_id, Some(l.c3.id));
        assert_eq!(branch.version, l.branch.version + 1);
    }

    #[test]
    fn test_rebase_restore_replays_tail() {
        let engine = engine();
        let l = linear(&engine);
        let side = engine.create_branch(&chat(), "side", Some(l.c1.id)).unwrap();
        let f1 = commit(&engine, &side, "f1", &["f1"]);

        let branch = engine
            .restore(request(l.branch.id, f1.id, Strategy::Rebase))
            .unwrap();

        let new_c3 = engine.get_checkpoint(branch.head_checkpoint_id.unwrap()).unwrap();
        assert_ne!(new_c3.id, l.c3.id);
        assert_eq!(new_c3.label, "c3");
        assert_eq!(new_c3.message_ids, l.c3.message_ids);

        let new_c2 = engine.get_checkpoint(new_c3.first_parent().unwrap()).unwrap();
        assert_eq!(new_c2.label, "c2");
        assert_eq!(new_c2.message_ids, l.c2.message_ids);
        assert_eq!(new_c2.parent_checkpoint_ids.as_slice(), &[f1.id]);

        assert_eq!(compiled(&engine, branch.id), vec!["m0", "m1", "f1", "m2a", "m2b", "m3"]);

        // Originals stay in storage untouched.
        assert_eq!(engine.get_checkpoint(l.c3.id).unwrap(), l.c3);
    }

    #[test]
    fn test_rebase_onto_head_keeps_head() {
        let engine = engine();
        let l = linear(&engine);
        let before = engine.store().count_checkpoints(&chat()).unwrap();
        let branch = engine
            .restore(request(l.branch.id, l.c3.id, Strategy::Rebase))
            .unwrap();
        assert_eq!(branch.head_checkpoint_id, Some(l.c3.id));
        assert_eq!(engine.store().count_checkpoints(&chat()).unwrap(), before);
    }

    #[test]
    fn test_restore_preconditions() {
        let engine = engine();
        let l = linear(&engine);

        let empty = engine.create_branch(&chat(), "empty", None).unwrap();
        match engine
            .restore(request(empty.id, l.c1.id, Strategy::Squash))
            .unwrap_err()
        {
            VersionError::EmptyBranch { branch } => assert_eq!(branch, empty.id),
            other => panic!("expected EmptyBranch, got: {:?}", other),
        }

        let elsewhere = engine
            .create_checkpoint(NewCheckpoint::new(ChatId::new("chat-2"), "bob"))
            .unwrap();
        assert!(matches!(
            engine.restore(request(l.branch.id, elsewhere.id, Strategy::Squash)),
            Err(VersionError::UnknownParent { .. })
        ));

        let mut stale = request(l.branch.id, l.c1.id, Strategy::Squash);
        stale.expected_version = Some(l.branch.version - 1);
        let before = engine.store().count_checkpoints(&chat()).unwrap();
        assert!(matches!(
            engine.restore(stale),
            Err(VersionError::StaleHead { .. })
        ));
        assert_eq!(engine.store().count_checkpoints(&chat()).unwrap(), before);
    }

    #[test]
    fn test_restore_never_mutates_checkpoints() {
        let engine = engine();
        let l = linear(&engine);
        let snapshot = engine.store().list_checkpoints(&chat()).unwrap();

        for strategy in Strategy::ALL {
            let _ = engine.restore(request(l.branch.id, l.c1.id, strategy));
        }

        for original in snapshot {
            assert_eq!(engine.get_checkpoint(original.id).unwrap(), original);
        }
    }

    /// Every message id appears at most once across the head's lineage.
    fn assert_lineage_disjoint(engine: &VersionEngine<InMemoryStore>, head: CheckpointId) {
        let mut seen = HashSet::new();
        for checkpoint in engine.reachable(head).unwrap().into_values() {
            for message in checkpoint.message_ids {
                assert!(seen.insert(message.clone()), "{} captured twice", message);
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

        #[test]
        fn restores_and_commits_keep_lineage_disjoint(
            ops in prop::collection::vec((0u8..4, 0usize..64, 1usize..4), 1..20)
        ) {
            let engine = engine();
            let main = engine.create_branch(&chat(), "main", None).unwrap();
            commit(&engine, &main, "root", &["seed"]);
            let mut counter = 0usize;

            for (kind, pick, width) in ops {
                let branch = engine.get_branch(main.id).unwrap();
                let all = engine.store().list_checkpoints(&chat()).unwrap();
                let target = all[pick % all.len()].id;

                match kind {
                    0 => {
                        let fresh: Vec<String> = (0..width)
                            .map(|_| {
                                counter += 1;
                                format!("n{}", counter)
                            })
                            .collect();
                        let fresh: Vec<&str> = fresh.iter().map(String::as_str).collect();
                        commit(&engine, &branch, "step", &fresh);
                    }
                    1 => {
                        engine.restore(request(main.id, target, Strategy::Squash)).unwrap();
                    }
                    2 => {
                        engine.restore(request(main.id, target, Strategy::Rebase)).unwrap();
                    }
                    _ => {
                        let head = branch.head_checkpoint_id.unwrap();
                        let legal = engine.is_ancestor(target, head).unwrap();
                        let result = engine.restore(request(main.id, target, Strategy::FastForward));
                        prop_assert!(result.is_ok() == legal);
                    }
                }

                let head = engine.get_branch(main.id).unwrap().head_checkpoint_id.unwrap();
                assert_lineage_disjoint(&engine, head);
            }
        }
    }
}
