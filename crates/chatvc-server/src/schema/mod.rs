//! API schema types for request/response definitions.
//!
//! Each sub-module defines the request and response types for a specific
//! API domain. Domain entities (`Branch`, `Checkpoint`, `MergeRequest`,
//! `Comment`) serialize directly; only envelopes and request bodies live here.

pub mod branches;
pub mod checkpoints;
pub mod comments;
pub mod compile;
pub mod merge_requests;
pub mod restore;

/// Author recorded when a request does not name one.
pub(crate) fn default_author() -> String {
    "system".to_string()
}
