//! Compile API schema types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatvc_core::{BranchId, CheckpointId, MessageId};
use chatvc_engine::Compilation;

/// Request to compile a branch into its message sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    pub branch_id: BranchId,
}

/// The ordered message ids reachable from a branch head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResponse {
    pub branch_id: BranchId,
    pub head_checkpoint_id: Option<CheckpointId>,
    pub message_ids: Vec<MessageId>,
    pub message_count: usize,
    pub checkpoint_count: usize,
    pub compiled_at: DateTime<Utc>,
}

impl From<Compilation> for CompileResponse {
    fn from(compiled: Compilation) -> Self {
        CompileResponse {
            branch_id: compiled.branch_id,
            head_checkpoint_id: compiled.head_checkpoint_id,
            message_count: compiled.messages.len(),
            message_ids: compiled.messages,
            checkpoint_count: compiled.checkpoint_count,
            compiled_at: compiled.compiled_at,
        }
    }
}
