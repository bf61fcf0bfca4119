//! Checkpoint API schema types.

use serde::{Deserialize, Serialize};

use chatvc_core::{Branch, BranchId, Checkpoint, MessageId};

/// Request to snapshot new messages onto a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckpointRequest {
    pub branch_id: BranchId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub comment: String,
    /// Messages captured since the branch head, in conversation order.
    pub message_ids: Vec<MessageId>,
    #[serde(default = "super::default_author")]
    pub author: String,
    /// Branch version the caller last observed. Omit to accept the current one.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Response after creating a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckpointResponse {
    pub checkpoint: Checkpoint,
    /// The branch after its head moved to the new checkpoint.
    pub branch: Branch,
}
