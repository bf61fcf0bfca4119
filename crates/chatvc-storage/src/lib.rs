//! Storage abstraction for conversation version control.
//!
//! Provides the [`VersionStore`] trait defining the storage contract that all
//! backends implement, plus the [`InMemoryStore`] and [`SqliteStore`] as
//! first-class backends.
//!
//! # Tables
//!
//! The contract covers four logical tables, all keyed by chat:
//! - **checkpoints**: insert-only; at most one root per chat
//! - **branches**: `(head, version)` mutated only by compare-and-swap
//! - **merge_requests**: `status` mutated only out of `open`
//! - **comments**: insert-only
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: VersionStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - `schema`: SQLite connection setup and migrations
//! - [`sqlite`]: SqliteStore implementation

pub mod error;
pub mod memory;
mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::VersionStore;
