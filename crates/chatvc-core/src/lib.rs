//! Data model for conversation version control.
//!
//! A chat's history is a DAG of immutable [`Checkpoint`]s. [`Branch`]es are
//! named, versioned pointers into that DAG, and [`MergeRequest`]s record the
//! integration of one branch into another. [`Comment`]s annotate checkpoints
//! and merge requests.

pub mod branch;
pub mod checkpoint;
pub mod comment;
pub mod error;
pub mod id;
pub mod merge_request;
pub mod strategy;

// Re-export commonly used types
pub use branch::Branch;
pub use checkpoint::{Checkpoint, NewCheckpoint, ParentIds};
pub use comment::{Comment, CommentParent};
pub use error::CoreError;
pub use id::{BranchId, ChatId, CheckpointId, CommentId, MergeRequestId, MessageId};
pub use merge_request::{MergeRequest, MergeRequestStatus, NewMergeRequest};
pub use strategy::Strategy;
