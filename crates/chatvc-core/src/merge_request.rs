//! Merge requests: proposals to integrate one branch into another.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{BranchId, ChatId, CheckpointId, MergeRequestId};

/// Lifecycle state of a merge request. `Merged` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestStatus {
    Open,
    Merged,
    Closed,
}

impl MergeRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeRequestStatus::Open => "open",
            MergeRequestStatus::Merged => "merged",
            MergeRequestStatus::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MergeRequestStatus::Open)
    }

    /// Only `open -> merged` and `open -> closed` are legal.
    pub fn can_transition_to(&self, next: MergeRequestStatus) -> bool {
        matches!(
            (self, next),
            (MergeRequestStatus::Open, MergeRequestStatus::Merged)
                | (MergeRequestStatus::Open, MergeRequestStatus::Closed)
        )
    }
}

impl fmt::Display for MergeRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeRequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(MergeRequestStatus::Open),
            "merged" => Ok(MergeRequestStatus::Merged),
            "closed" => Ok(MergeRequestStatus::Closed),
            other => Err(CoreError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// A proposal, and later the record, of integrating `source` into `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: MergeRequestId,
    pub chat_id: ChatId,
    pub source_branch_id: BranchId,
    pub target_branch_id: BranchId,
    pub title: String,
    pub description: String,
    pub status: MergeRequestStatus,
    /// Nearest common ancestor of the two heads when the request was opened.
    pub divergence_point_checkpoint_id: Option<CheckpointId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl MergeRequest {
    pub fn is_open(&self) -> bool {
        self.status == MergeRequestStatus::Open
    }
}

/// Input for opening a merge request.
#[derive(Debug, Clone)]
pub struct NewMergeRequest {
    pub chat_id: ChatId,
    pub source_branch_id: BranchId,
    pub target_branch_id: BranchId,
    pub title: String,
    pub description: String,
    pub created_by: String,
}

impl NewMergeRequest {
    pub fn materialize(self, divergence_point: Option<CheckpointId>) -> MergeRequest {
        MergeRequest {
            id: MergeRequestId::new(),
            chat_id: self.chat_id,
            source_branch_id: self.source_branch_id,
            target_branch_id: self.target_branch_id,
            title: self.title,
            description: self.description,
            status: MergeRequestStatus::Open,
            divergence_point_checkpoint_id: divergence_point,
            created_by: self.created_by,
            created_at: Utc::now(),
            merged_at: None,
            closed_at: None,
        }
    }
}
