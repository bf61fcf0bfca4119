//! Restore API schema types.

use serde::{Deserialize, Serialize};

use chatvc_core::{Branch, BranchId, CheckpointId, Strategy};

/// Request to move a branch back to an earlier checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreCheckpointRequest {
    pub branch_id: BranchId,
    pub checkpoint_id: CheckpointId,
    pub strategy: Strategy,
    #[serde(default = "super::default_author")]
    pub author: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Response after a restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreCheckpointResponse {
    pub strategy: Strategy,
    pub branch: Branch,
}
