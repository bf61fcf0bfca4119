//! Deterministic linearization of a branch into an ordered message sequence.
//!
//! The checkpoints reachable from the head are sorted topologically (every
//! checkpoint after all of its parents) with Kahn's algorithm over a petgraph
//! `DiGraph`. Among checkpoints that are ready at the same time, the one with
//! the earliest `created_at` goes first, then the lowest id. Each checkpoint
//! contributes its message ids in stored order; a message id is emitted only
//! the first time it is seen.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use chatvc_core::{BranchId, Checkpoint, CheckpointId, MessageId};
use chatvc_storage::{StorageError, VersionStore};

use crate::error::VersionError;
use crate::VersionEngine;

/// Result of compiling a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compilation {
    pub branch_id: BranchId,
    pub head_checkpoint_id: Option<CheckpointId>,
    pub messages: Vec<MessageId>,
    /// Number of checkpoints reachable from the head.
    pub checkpoint_count: usize,
    pub compiled_at: DateTime<Utc>,
}

impl<S: VersionStore> VersionEngine<S> {
    /// Linearizes the branch and records the compilation time.
    ///
    /// A headless branch compiles to an empty sequence.
    pub fn compile(&self, branch_id: BranchId) -> Result<Compilation, VersionError> {
        let branch = self.store.get_branch(branch_id)?;

        let (messages, checkpoint_count) = match branch.head_checkpoint_id {
            None => (Vec::new(), 0),
            Some(head) => {
                let reachable = self.reachable(head)?;
                let order = linearize(&reachable)?;
                (flatten(&order, &reachable), order.len())
            }
        };

        let compiled_at = Utc::now();
        self.store.set_last_compiled(branch.id, compiled_at)?;
        tracing::debug!(
            "compiled branch '{}': {} checkpoint(s), {} message(s)",
            branch.name,
            checkpoint_count,
            messages.len()
        );

        Ok(Compilation {
            branch_id: branch.id,
            head_checkpoint_id: branch.head_checkpoint_id,
            messages,
            checkpoint_count,
            compiled_at,
        })
    }

    /// Checkpoints reachable from `head` but not from `base`, in compiled
    /// order.
    pub(crate) fn compiled_tail(
        &self,
        head: CheckpointId,
        base: Option<CheckpointId>,
    ) -> Result<Vec<Checkpoint>, VersionError> {
        let mut reachable = self.reachable(head)?;
        let excluded: HashSet<CheckpointId> = match base {
            Some(base) => self.reachable(base)?.into_keys().collect(),
            None => HashSet::new(),
        };

        let order = linearize(&reachable)?;
        Ok(order
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| reachable.remove(&id))
            .collect())
    }
}

/// Topological order of `checkpoints`, ties broken by `(created_at, id)`.
///
/// Parent links that leave the set are ignored.
pub(crate) fn linearize(
    checkpoints: &HashMap<CheckpointId, Checkpoint>,
) -> Result<Vec<CheckpointId>, VersionError> {
    let mut graph = DiGraph::<&Checkpoint, ()>::with_capacity(checkpoints.len(), checkpoints.len());
    let mut index: HashMap<CheckpointId, NodeIndex> = HashMap::with_capacity(checkpoints.len());
    for checkpoint in checkpoints.values() {
        index.insert(checkpoint.id, graph.add_node(checkpoint));
    }
    for checkpoint in checkpoints.values() {
        let Some(&child) = index.get(&checkpoint.id) else {
            continue;
        };
        for parent in &checkpoint.parent_checkpoint_ids {
            if let Some(&parent) = index.get(parent) {
                graph.add_edge(parent, child, ());
            }
        }
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors_directed(node, Direction::Incoming).count())
        .collect();

    let mut ready = BinaryHeap::new();
    for node in graph.node_indices() {
        if in_degree[node.index()] == 0 {
            let checkpoint = graph[node];
            ready.push(Reverse((checkpoint.created_at, checkpoint.id, node)));
        }
    }

    let mut order = Vec::with_capacity(checkpoints.len());
    while let Some(Reverse((_, id, node))) = ready.pop() {
        order.push(id);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                let checkpoint = graph[next];
                ready.push(Reverse((checkpoint.created_at, checkpoint.id, next)));
            }
        }
    }

    if order.len() != checkpoints.len() {
        return Err(VersionError::Storage(StorageError::IntegrityError {
            reason: format!(
                "checkpoint graph has a cycle: ordered {} of {} checkpoints",
                order.len(),
                checkpoints.len()
            ),
        }));
    }
    Ok(order)
}

/// Concatenates message ids along `order`, keeping first occurrences.
pub(crate) fn flatten(
    order: &[CheckpointId],
    checkpoints: &HashMap<CheckpointId, Checkpoint>,
) -> Vec<MessageId> {
    let mut messages = IndexSet::new();
    for id in order {
        if let Some(checkpoint) = checkpoints.get(id) {
            messages.extend(checkpoint.message_ids.iter().cloned());
        }
    }
    messages.into_iter().collect()
}
