//! Version-control engine for chat histories.
//!
//! [`VersionEngine`] is a stateless service over a [`VersionStore`]. Every
//! operation names the branch, checkpoint or merge request it acts on; there
//! is no notion of a "current" branch.
//!
//! # Modules
//!
//! - [`checkpoints`]: checkpoint creation and DAG traversal (ancestors, LCA)
//! - [`branches`]: branch creation and compare-and-swap head moves
//! - [`compiler`]: deterministic linearization of a branch into messages
//! - [`restore`]: squash / fast-forward / rebase of a branch onto a checkpoint
//! - [`merge`]: merge request lifecycle and the three merge strategies
//! - [`comments`]: append-only annotations
//! - [`overview`]: per-chat snapshot of all version state
//!
//! # Concurrency
//!
//! The only contended state is a branch's `(head, version)` pair, and it only
//! changes through [`VersionStore::compare_and_swap_head`], or through
//! [`VersionStore::complete_merge`] when a merge lands. Checkpoints are
//! written before the swap; if the swap loses, they stay in storage
//! unreferenced and the branch is unchanged.

pub mod branches;
pub mod checkpoints;
pub mod comments;
pub mod compiler;
pub mod error;
pub mod merge;
pub mod overview;
pub mod restore;

pub use checkpoints::{Ancestors, CommitOutcome, CommitRequest};
pub use compiler::Compilation;
pub use error::VersionError;
pub use overview::VersionOverview;
pub use restore::RestoreRequest;

use chatvc_storage::VersionStore;

/// The conversation version-control service.
pub struct VersionEngine<S> {
    store: S,
}

impl<S: VersionStore> VersionEngine<S> {
    pub fn new(store: S) -> Self {
        VersionEngine { store }
    }

    /// Direct access to the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
