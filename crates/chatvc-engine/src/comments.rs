//! Append-only comments on checkpoints and merge requests.

use chatvc_core::{Comment, CommentParent};
use chatvc_storage::VersionStore;

use crate::error::VersionError;
use crate::VersionEngine;

impl<S: VersionStore> VersionEngine<S> {
    /// Attaches a comment to an existing checkpoint or merge request.
    pub fn add_comment(
        &self,
        parent: CommentParent,
        author: &str,
        content: &str,
    ) -> Result<Comment, VersionError> {
        if content.trim().is_empty() {
            return Err(VersionError::InvalidRequest(
                "comment content must not be empty".to_string(),
            ));
        }
        self.ensure_comment_parent(parent)?;

        let comment = Comment::new(parent, author, content);
        self.store.insert_comment(&comment)?;
        tracing::debug!(
            "comment {} added to {} {}",
            comment.id,
            parent.type_name(),
            parent.id_string()
        );
        Ok(comment)
    }

    /// Comments on `parent`, oldest first.
    pub fn list_comments(&self, parent: CommentParent) -> Result<Vec<Comment>, VersionError> {
        self.ensure_comment_parent(parent)?;
        Ok(self.store.list_comments(parent)?)
    }

    fn ensure_comment_parent(&self, parent: CommentParent) -> Result<(), VersionError> {
        match parent {
            CommentParent::Checkpoint(id) => {
                self.store.get_checkpoint(id)?;
            }
            CommentParent::MergeRequest(id) => {
                self.store.get_merge_request(id)?;
            }
        }
        Ok(())
    }
}
