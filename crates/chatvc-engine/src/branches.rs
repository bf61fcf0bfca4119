//! Branch management: creation, lookup and compare-and-swap head moves.

use chatvc_core::{Branch, BranchId, ChatId, CheckpointId};
use chatvc_storage::{StorageError, VersionStore};

use crate::error::VersionError;
use crate::VersionEngine;

impl<S: VersionStore> VersionEngine<S> {
    /// Creates a branch at `base` (or headless), version 0.
    pub fn create_branch(
        &self,
        chat: &ChatId,
        name: &str,
        base: Option<CheckpointId>,
    ) -> Result<Branch, VersionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VersionError::InvalidRequest(
                "branch name must not be empty".to_string(),
            ));
        }
        if let Some(base) = base {
            self.checkpoint_in_chat(base, chat)?;
        }

        let branch = Branch::new(chat.clone(), name, base);
        self.store.insert_branch(&branch)?;
        tracing::info!("created branch '{}' ({}) in chat {}", branch.name, branch.id, chat);
        Ok(branch)
    }

    pub fn get_branch(&self, id: BranchId) -> Result<Branch, VersionError> {
        Ok(self.store.get_branch(id)?)
    }

    /// Loads a branch, treating a branch of another chat as missing.
    pub fn get_branch_in_chat(&self, chat: &ChatId, id: BranchId) -> Result<Branch, VersionError> {
        let branch = self.store.get_branch(id)?;
        if &branch.chat_id != chat {
            return Err(VersionError::NotFound {
                entity: "branch",
                id: id.to_string(),
            });
        }
        Ok(branch)
    }

    pub fn get_branch_by_name(&self, chat: &ChatId, name: &str) -> Result<Branch, VersionError> {
        self.store
            .find_branch_by_name(chat, name)?
            .ok_or_else(|| VersionError::NotFound {
                entity: "branch",
                id: format!("{}/{}", chat, name),
            })
    }

    pub fn list_branches(&self, chat: &ChatId) -> Result<Vec<Branch>, VersionError> {
        Ok(self.store.list_branches(chat)?)
    }

    /// Moves a branch head to an existing checkpoint of the same chat,
    /// provided the branch is still at `expected_version`.
    pub fn advance_head(
        &self,
        id: BranchId,
        expected_version: u64,
        new_head: CheckpointId,
    ) -> Result<Branch, VersionError> {
        let branch = self.store.get_branch(id)?;
        self.checkpoint_in_chat(new_head, &branch.chat_id)?;
        self.swap_head(&branch, expected_version, Some(new_head))
    }

    /// Single compare-and-swap on the branch head.
    pub(crate) fn swap_head(
        &self,
        branch: &Branch,
        expected_version: u64,
        new_head: Option<CheckpointId>,
    ) -> Result<Branch, VersionError> {
        match self
            .store
            .compare_and_swap_head(branch.id, expected_version, new_head)
        {
            Ok(updated) => {
                tracing::info!(
                    "branch '{}' head {:?} -> {:?} (version {})",
                    updated.name,
                    branch.head_checkpoint_id,
                    updated.head_checkpoint_id,
                    updated.version
                );
                Ok(updated)
            }
            Err(err @ StorageError::StaleBranchVersion { .. }) => {
                tracing::warn!("head swap on branch '{}' lost: {}", branch.name, err);
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
