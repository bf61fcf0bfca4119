//! Core error types for chatvc-core.
//!
//! These cover decoding of identifiers and enum tags coming from storage or
//! from request payloads.

use thiserror::Error;

/// Core errors produced by the chatvc-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A string was not a valid identifier of the expected kind.
    #[error("invalid {kind} id '{value}': {reason}")]
    InvalidId {
        kind: &'static str,
        value: String,
        reason: String,
    },

    /// Unrecognized restore/merge strategy name.
    #[error("unknown strategy: '{value}' (expected squash, fast-forward or rebase)")]
    UnknownStrategy { value: String },

    /// Unrecognized merge request status.
    #[error("unknown merge request status: '{value}'")]
    UnknownStatus { value: String },

    /// Unrecognized comment parent type.
    #[error("unknown comment parent type: '{value}'")]
    UnknownParentType { value: String },
}
