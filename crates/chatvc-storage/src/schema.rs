//! Connection setup and schema migrations for [`SqliteStore`](crate::SqliteStore).
//!
//! The schema is versioned through SQLite's `user_version` pragma by
//! `rusqlite_migration`; each migration is an embedded `.sql` file.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

const INITIAL_SCHEMA: &str = include_str!("migrations/001_initial_schema.sql");

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(INITIAL_SCHEMA)])
}

/// Where a store keeps its database.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    File(&'a str),
    Memory,
}

/// Opens a connection with foreign keys enforced and the schema at the latest
/// version. File databases run in WAL mode with `synchronous = NORMAL`.
pub(crate) fn open(target: Target<'_>) -> Result<Connection, StorageError> {
    let mut conn = match target {
        Target::File(path) => {
            let conn = Connection::open(path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn
        }
        Target::Memory => Connection::open_in_memory()?,
    };
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations()
        .to_latest(&mut conn)
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    tracing::debug!("sqlite schema at version {} ({:?})", version, target);
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn memory_database_has_all_tables() {
        let conn = open(Target::Memory).unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for expected in ["branches", "checkpoints", "comments", "merge_requests"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn reopening_a_file_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.db");
        let path = path.to_str().unwrap();

        drop(open(Target::File(path)).unwrap());
        let conn = open(Target::File(path)).unwrap();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
