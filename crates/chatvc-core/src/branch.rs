//! Branches: named, optimistically-versioned head pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{BranchId, ChatId, CheckpointId};

/// A named, mutable pointer into a chat's checkpoint DAG.
///
/// `version` starts at 0 and is incremented on every head change; writers
/// present the version they read to detect concurrent modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub chat_id: ChatId,
    pub name: String,
    /// `None` until the first checkpoint lands on this branch.
    pub head_checkpoint_id: Option<CheckpointId>,
    pub version: u64,
    pub last_compiled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(chat_id: ChatId, name: impl Into<String>, head: Option<CheckpointId>) -> Self {
        Branch {
            id: BranchId::new(),
            chat_id,
            name: name.into(),
            head_checkpoint_id: head,
            version: 0,
            last_compiled_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head_checkpoint_id.is_none()
    }
}
