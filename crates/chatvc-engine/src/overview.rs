//! Per-chat snapshot of all version-control state.

use serde::Serialize;

use chatvc_core::{Branch, ChatId, Checkpoint, MergeRequest};
use chatvc_storage::VersionStore;

use crate::error::VersionError;
use crate::VersionEngine;

/// Everything recorded for one chat, each list oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct VersionOverview {
    pub chat_id: ChatId,
    pub branches: Vec<Branch>,
    pub checkpoints: Vec<Checkpoint>,
    pub merge_requests: Vec<MergeRequest>,
}

impl<S: VersionStore> VersionEngine<S> {
    pub fn overview(&self, chat: &ChatId) -> Result<VersionOverview, VersionError> {
        Ok(VersionOverview {
            chat_id: chat.clone(),
            branches: self.store.list_branches(chat)?,
            checkpoints: self.store.list_checkpoints(chat)?,
            merge_requests: self.store.list_merge_requests(chat)?,
        })
    }
}
