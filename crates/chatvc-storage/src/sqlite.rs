//! SQLite implementation of [`VersionStore`].
//!
//! [`SqliteStore`] persists the version-control tables in a SQLite database
//! with WAL mode and automatic schema migrations. Parent lists and message
//! id lists are stored as JSON TEXT columns via serde_json; timestamps are
//! RFC 3339 TEXT with nanosecond precision so they sort lexicographically.
//!
//! The connection sits behind a mutex. Guarded writes (`compare_and_swap_head`,
//! `transition_merge_request`) run as a conditional `UPDATE` inside one
//! transaction, and a zero row count is turned into the matching conflict
//! error.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use chatvc_core::{
    Branch, BranchId, ChatId, Checkpoint, CheckpointId, Comment, CommentParent, MergeRequest,
    MergeRequestId, MergeRequestStatus, MessageId, ParentIds,
};

use crate::error::StorageError;
use crate::schema::{self, Target};
use crate::traits::{ensure_terminal, VersionStore};

/// SQLite-backed implementation of [`VersionStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = schema::open(Target::File(path))?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = schema::open(Target::Memory)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::IntegrityError {
            reason: "sqlite connection lock poisoned".to_string(),
        })
    }

    fn load_branch(conn: &Connection, id: BranchId) -> Result<Branch, StorageError> {
        conn.query_row(
            &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = ?1"),
            params![id.to_string()],
            BranchRow::read,
        )
        .optional()?
        .ok_or(StorageError::BranchNotFound(id))?
        .decode()
    }

    fn load_merge_request(
        conn: &Connection,
        id: MergeRequestId,
    ) -> Result<MergeRequest, StorageError> {
        conn.query_row(
            &format!("SELECT {MERGE_REQUEST_COLUMNS} FROM merge_requests WHERE id = ?1"),
            params![id.to_string()],
            MergeRequestRow::read,
        )
        .optional()?
        .ok_or(StorageError::MergeRequestNotFound(id))?
        .decode()
    }

    /// Conditional head update; zero rows becomes a not-found or stale error.
    fn swap_head_in(
        conn: &Connection,
        id: BranchId,
        expected_version: u64,
        new_head: Option<CheckpointId>,
    ) -> Result<(), StorageError> {
        let changed = conn.execute(
            "UPDATE branches SET head_checkpoint_id = ?1, version = version + 1
             WHERE id = ?2 AND version = ?3",
            params![
                new_head.map(|h| h.to_string()),
                id.to_string(),
                expected_version as i64
            ],
        )?;
        if changed > 0 {
            return Ok(());
        }

        let actual: Option<i64> = conn
            .query_row(
                "SELECT version FROM branches WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match actual {
            None => Err(StorageError::BranchNotFound(id)),
            Some(actual) => Err(StorageError::StaleBranchVersion {
                branch: id,
                expected: expected_version,
                actual: actual as u64,
            }),
        }
    }

    /// Moves a merge request out of `open`, stamping the matching column.
    fn transition_in(
        conn: &Connection,
        id: MergeRequestId,
        next: MergeRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let stamp_column = match next {
            MergeRequestStatus::Merged => "merged_at",
            _ => "closed_at",
        };
        let changed = conn.execute(
            &format!(
                "UPDATE merge_requests SET status = ?1, {stamp_column} = ?2
                 WHERE id = ?3 AND status = 'open'"
            ),
            params![next.as_str(), ts_to_str(&at), id.to_string()],
        )?;
        if changed > 0 {
            return Ok(());
        }

        // Either missing or already resolved.
        let current = Self::load_merge_request(conn, id)?;
        Err(StorageError::MergeRequestNotOpen {
            id,
            status: current.status,
        })
    }
}

/// True for `UNIQUE` constraint failures (not primary key or foreign key).
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn ts_to_str(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn str_to_ts(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn opt_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.as_deref().map(str_to_ts).transpose()
}

// ---------------------------------------------------------------------------
// Raw row shapes
//
// Rows are read as plain columns inside the rusqlite closure, then decoded
// into domain types where failures can surface as StorageError.
// ---------------------------------------------------------------------------

const CHECKPOINT_COLUMNS: &str =
    "id, chat_id, label, comment, parents_json, message_ids_json, created_at, created_by";

struct CheckpointRow {
    id: String,
    chat_id: String,
    label: String,
    comment: String,
    parents_json: String,
    message_ids_json: String,
    created_at: String,
    created_by: String,
}

impl CheckpointRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CheckpointRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            label: row.get(2)?,
            comment: row.get(3)?,
            parents_json: row.get(4)?,
            message_ids_json: row.get(5)?,
            created_at: row.get(6)?,
            created_by: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Checkpoint, StorageError> {
        let parent_checkpoint_ids: ParentIds = serde_json::from_str(&self.parents_json)?;
        let message_ids: Vec<MessageId> = serde_json::from_str(&self.message_ids_json)?;
        Ok(Checkpoint {
            id: self.id.parse()?,
            chat_id: ChatId::new(self.chat_id),
            label: self.label,
            comment: self.comment,
            parent_checkpoint_ids,
            message_ids,
            created_at: str_to_ts(&self.created_at)?,
            created_by: self.created_by,
        })
    }
}

const BRANCH_COLUMNS: &str =
    "id, chat_id, name, head_checkpoint_id, version, last_compiled_at, created_at";

struct BranchRow {
    id: String,
    chat_id: String,
    name: String,
    head: Option<String>,
    version: i64,
    last_compiled_at: Option<String>,
    created_at: String,
}

impl BranchRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(BranchRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            name: row.get(2)?,
            head: row.get(3)?,
            version: row.get(4)?,
            last_compiled_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Branch, StorageError> {
        let version = u64::try_from(self.version).map_err(|_| StorageError::IntegrityError {
            reason: format!("branch {} has negative version {}", self.id, self.version),
        })?;
        Ok(Branch {
            id: self.id.parse()?,
            chat_id: ChatId::new(self.chat_id),
            name: self.name,
            head_checkpoint_id: self
                .head
                .as_deref()
                .map(str::parse::<CheckpointId>)
                .transpose()?,
            version,
            last_compiled_at: opt_ts(self.last_compiled_at)?,
            created_at: str_to_ts(&self.created_at)?,
        })
    }
}

const MERGE_REQUEST_COLUMNS: &str = "id, chat_id, source_branch_id, target_branch_id, title, \
     description, status, divergence_point_checkpoint_id, created_by, created_at, merged_at, \
     closed_at";

struct MergeRequestRow {
    id: String,
    chat_id: String,
    source: String,
    target: String,
    title: String,
    description: String,
    status: String,
    divergence_point: Option<String>,
    created_by: String,
    created_at: String,
    merged_at: Option<String>,
    closed_at: Option<String>,
}

impl MergeRequestRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(MergeRequestRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            source: row.get(2)?,
            target: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            divergence_point: row.get(7)?,
            created_by: row.get(8)?,
            created_at: row.get(9)?,
            merged_at: row.get(10)?,
            closed_at: row.get(11)?,
        })
    }

    fn decode(self) -> Result<MergeRequest, StorageError> {
        Ok(MergeRequest {
            id: self.id.parse()?,
            chat_id: ChatId::new(self.chat_id),
            source_branch_id: self.source.parse()?,
            target_branch_id: self.target.parse()?,
            title: self.title,
            description: self.description,
            status: self.status.parse()?,
            divergence_point_checkpoint_id: self
                .divergence_point
                .as_deref()
                .map(str::parse::<CheckpointId>)
                .transpose()?,
            created_by: self.created_by,
            created_at: str_to_ts(&self.created_at)?,
            merged_at: opt_ts(self.merged_at)?,
            closed_at: opt_ts(self.closed_at)?,
        })
    }
}

struct CommentRow {
    id: String,
    parent_type: String,
    parent_id: String,
    author_id: String,
    content: String,
    created_at: String,
}

impl CommentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CommentRow {
            id: row.get(0)?,
            parent_type: row.get(1)?,
            parent_id: row.get(2)?,
            author_id: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Comment, StorageError> {
        Ok(Comment {
            id: self.id.parse()?,
            parent: CommentParent::from_parts(&self.parent_type, &self.parent_id)?,
            author_id: self.author_id,
            content: self.content,
            created_at: str_to_ts(&self.created_at)?,
        })
    }
}

fn collect_rows<R, T>(
    rows: impl Iterator<Item = rusqlite::Result<R>>,
    decode: impl Fn(R) -> Result<T, StorageError>,
) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(decode(row?)?);
    }
    Ok(out)
}

impl VersionStore for SqliteStore {
    // -------------------------------------------------------------------
    // Checkpoints
    // -------------------------------------------------------------------

    fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO checkpoints (id, chat_id, label, comment, parents_json, message_ids_json, is_root, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                checkpoint.id.to_string(),
                checkpoint.chat_id.as_str(),
                checkpoint.label,
                checkpoint.comment,
                serde_json::to_string(&checkpoint.parent_checkpoint_ids)?,
                serde_json::to_string(&checkpoint.message_ids)?,
                checkpoint.is_root(),
                ts_to_str(&checkpoint.created_at),
                checkpoint.created_by,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if checkpoint.is_root() && is_unique_violation(&e) => {
                Err(StorageError::RootAlreadyExists {
                    chat: checkpoint.chat_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_checkpoint(&self, id: CheckpointId) -> Result<Checkpoint, StorageError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {CHECKPOINT_COLUMNS} FROM checkpoints WHERE id = ?1"),
            params![id.to_string()],
            CheckpointRow::read,
        )
        .optional()?
        .ok_or(StorageError::CheckpointNotFound(id))?
        .decode()
    }

    fn list_checkpoints(&self, chat: &ChatId) -> Result<Vec<Checkpoint>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHECKPOINT_COLUMNS} FROM checkpoints WHERE chat_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![chat.as_str()], CheckpointRow::read)?;
        collect_rows(rows, CheckpointRow::decode)
    }

    fn count_checkpoints(&self, chat: &ChatId) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM checkpoints WHERE chat_id = ?1",
            params![chat.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // -------------------------------------------------------------------
    // Branches
    // -------------------------------------------------------------------

    fn insert_branch(&self, branch: &Branch) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO branches (id, chat_id, name, head_checkpoint_id, version, last_compiled_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                branch.id.to_string(),
                branch.chat_id.as_str(),
                branch.name,
                branch.head_checkpoint_id.map(|h| h.to_string()),
                branch.version as i64,
                branch.last_compiled_at.as_ref().map(ts_to_str),
                ts_to_str(&branch.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StorageError::DuplicateBranchName {
                chat: branch.chat_id.clone(),
                name: branch.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn get_branch(&self, id: BranchId) -> Result<Branch, StorageError> {
        let conn = self.conn()?;
        Self::load_branch(&conn, id)
    }

    fn find_branch_by_name(
        &self,
        chat: &ChatId,
        name: &str,
    ) -> Result<Option<Branch>, StorageError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE chat_id = ?1 AND name = ?2"),
            params![chat.as_str(), name],
            BranchRow::read,
        )
        .optional()?
        .map(BranchRow::decode)
        .transpose()
    }

    fn list_branches(&self, chat: &ChatId) -> Result<Vec<Branch>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE chat_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![chat.as_str()], BranchRow::read)?;
        collect_rows(rows, BranchRow::decode)
    }

    fn compare_and_swap_head(
        &self,
        id: BranchId,
        expected_version: u64,
        new_head: Option<CheckpointId>,
    ) -> Result<Branch, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::swap_head_in(&tx, id, expected_version, new_head)?;
        let branch = Self::load_branch(&tx, id)?;
        tx.commit()?;
        Ok(branch)
    }

    fn set_last_compiled(&self, id: BranchId, at: DateTime<Utc>) -> Result<Branch, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE branches SET last_compiled_at = ?1 WHERE id = ?2",
            params![ts_to_str(&at), id.to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::BranchNotFound(id));
        }
        let branch = Self::load_branch(&tx, id)?;
        tx.commit()?;
        Ok(branch)
    }

    // -------------------------------------------------------------------
    // Merge requests
    // -------------------------------------------------------------------

    fn insert_merge_request(&self, request: &MergeRequest) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO merge_requests (id, chat_id, source_branch_id, target_branch_id, title, description, status, divergence_point_checkpoint_id, created_by, created_at, merged_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                request.id.to_string(),
                request.chat_id.as_str(),
                request.source_branch_id.to_string(),
                request.target_branch_id.to_string(),
                request.title,
                request.description,
                request.status.as_str(),
                request.divergence_point_checkpoint_id.map(|c| c.to_string()),
                request.created_by,
                ts_to_str(&request.created_at),
                request.merged_at.as_ref().map(ts_to_str),
                request.closed_at.as_ref().map(ts_to_str),
            ],
        )?;
        Ok(())
    }

    fn get_merge_request(&self, id: MergeRequestId) -> Result<MergeRequest, StorageError> {
        let conn = self.conn()?;
        Self::load_merge_request(&conn, id)
    }

    fn list_merge_requests(&self, chat: &ChatId) -> Result<Vec<MergeRequest>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MERGE_REQUEST_COLUMNS} FROM merge_requests WHERE chat_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![chat.as_str()], MergeRequestRow::read)?;
        collect_rows(rows, MergeRequestRow::decode)
    }

    fn transition_merge_request(
        &self,
        id: MergeRequestId,
        next: MergeRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<MergeRequest, StorageError> {
        ensure_terminal(next)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::transition_in(&tx, id, next, at)?;
        let request = Self::load_merge_request(&tx, id)?;
        tx.commit()?;
        Ok(request)
    }

    fn complete_merge(
        &self,
        request: MergeRequestId,
        target: BranchId,
        expected_version: u64,
        new_head: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(MergeRequest, Branch), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        // Dropping the transaction on either failure rolls back both updates.
        Self::transition_in(&tx, request, MergeRequestStatus::Merged, at)?;
        Self::swap_head_in(&tx, target, expected_version, Some(new_head))?;
        let merged = Self::load_merge_request(&tx, request)?;
        let branch = Self::load_branch(&tx, target)?;
        tx.commit()?;
        Ok((merged, branch))
    }

    // -------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------

    fn insert_comment(&self, comment: &Comment) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO comments (id, parent_type, parent_id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id.to_string(),
                comment.parent.type_name(),
                comment.parent.id_string(),
                comment.author_id,
                comment.content,
                ts_to_str(&comment.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_comments(&self, parent: CommentParent) -> Result<Vec<Comment>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, parent_type, parent_id, author_id, content, created_at
             FROM comments WHERE parent_type = ?1 AND parent_id = ?2
             ORDER BY created_at, seq",
        )?;
        let rows = stmt.query_map(
            params![parent.type_name(), parent.id_string()],
            CommentRow::read,
        )?;
        collect_rows(rows, CommentRow::decode)
    }
}
