//! Merge request API schema types.

use serde::{Deserialize, Serialize};

use chatvc_core::{Branch, BranchId, MergeRequest, Strategy};

/// Request to open a merge request between two branches of a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMergeRequestRequest {
    pub source_branch_id: BranchId,
    pub target_branch_id: BranchId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "super::default_author")]
    pub author: String,
}

/// Body of a merge call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestBody {
    pub strategy: Strategy,
    #[serde(default = "super::default_author")]
    pub author: String,
}

/// Response after a successful merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResponse {
    pub merge_request: MergeRequest,
    /// The target branch after its head moved.
    pub target_branch: Branch,
}

/// Response listing the merge requests of a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMergeRequestsResponse {
    pub merge_requests: Vec<MergeRequest>,
}
