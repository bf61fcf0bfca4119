//! Immutable checkpoints: the nodes of a chat's history DAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{ChatId, CheckpointId, MessageId};

/// Parent links of a checkpoint. Zero entries for the root, one for a normal
/// commit, two for a merge commit (second parent is the foreign branch's
/// contributing checkpoint).
pub type ParentIds = SmallVec<[CheckpointId; 2]>;

/// Maximum number of parents a checkpoint may have.
pub const MAX_PARENTS: usize = 2;

/// An immutable snapshot of the messages newly captured at one point of a
/// branch's history.
///
/// `message_ids` is ordered by original message creation time. Across all
/// checkpoints reachable from one head, each message is captured once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub chat_id: ChatId,
    pub label: String,
    pub comment: String,
    pub parent_checkpoint_ids: ParentIds,
    pub message_ids: Vec<MessageId>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Checkpoint {
    pub fn is_root(&self) -> bool {
        self.parent_checkpoint_ids.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_checkpoint_ids.len() > 1
    }

    /// The first parent, i.e. the lineage this checkpoint was committed on.
    pub fn first_parent(&self) -> Option<CheckpointId> {
        self.parent_checkpoint_ids.first().copied()
    }
}

/// Input for creating a checkpoint. Identity and timestamp are assigned when
/// the checkpoint is materialized.
#[derive(Debug, Clone)]
pub struct NewCheckpoint {
    pub chat_id: ChatId,
    pub parent_checkpoint_ids: ParentIds,
    pub message_ids: Vec<MessageId>,
    pub label: String,
    pub comment: String,
    pub created_by: String,
}

impl NewCheckpoint {
    pub fn new(chat_id: ChatId, created_by: impl Into<String>) -> Self {
        NewCheckpoint {
            chat_id,
            parent_checkpoint_ids: SmallVec::new(),
            message_ids: Vec::new(),
            label: String::new(),
            comment: String::new(),
            created_by: created_by.into(),
        }
    }

    pub fn with_parent(mut self, parent: CheckpointId) -> Self {
        self.parent_checkpoint_ids.push(parent);
        self
    }

    pub fn with_parents(mut self, parents: impl IntoIterator<Item = CheckpointId>) -> Self {
        self.parent_checkpoint_ids.extend(parents);
        self
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = MessageId>) -> Self {
        self.message_ids.extend(messages);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Assigns a fresh id and the current time.
    pub fn materialize(self) -> Checkpoint {
        self.materialize_at(Utc::now())
    }

    pub fn materialize_at(self, created_at: DateTime<Utc>) -> Checkpoint {
        Checkpoint {
            id: CheckpointId::new(),
            chat_id: self.chat_id,
            label: self.label,
            comment: self.comment,
            parent_checkpoint_ids: self.parent_checkpoint_ids,
            message_ids: self.message_ids,
            created_at,
            created_by: self.created_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_parent_order() {
        let a = CheckpointId::new();
        let b = CheckpointId::new();
        let cp = NewCheckpoint::new(ChatId::new("c"), "alice")
            .with_parents([a, b])
            .with_label("merge")
            .materialize();

        assert!(cp.is_merge());
        assert!(!cp.is_root());
        assert_eq!(cp.first_parent(), Some(a));
        assert_eq!(cp.parent_checkpoint_ids.as_slice(), &[a, b]);
        assert_eq!(cp.created_by, "alice");
    }

    #[test]
    fn root_has_no_first_parent() {
        let cp = NewCheckpoint::new(ChatId::new("c"), "bob")
            .with_messages([MessageId::new("m1"), MessageId::new("m2")])
            .materialize();
        assert!(cp.is_root());
        assert_eq!(cp.first_parent(), None);
        assert_eq!(cp.message_ids.len(), 2);
    }

    #[test]
    fn parents_serialize_as_plain_list() {
        let parent = CheckpointId::new();
        let cp = NewCheckpoint::new(ChatId::new("c"), "x")
            .with_parent(parent)
            .materialize();
        let json = serde_json::to_value(&cp).unwrap();
        assert_eq!(
            json["parent_checkpoint_ids"],
            serde_json::json!([parent.to_string()])
        );
        let back: Checkpoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, cp);
    }
}
