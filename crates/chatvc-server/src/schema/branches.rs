//! Branch API schema types.

use serde::{Deserialize, Serialize};

use chatvc_core::{Branch, CheckpointId};

/// Request to create a named branch in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBranchRequest {
    pub name: String,
    /// Initial head. Omitted for an empty branch.
    #[serde(default)]
    pub base_checkpoint_id: Option<CheckpointId>,
}

/// Response listing the branches of a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBranchesResponse {
    pub branches: Vec<Branch>,
}
