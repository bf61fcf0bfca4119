//! Application state shared across handlers.
//!
//! The engine takes `&self` for every operation and its stores guard their
//! own mutable state, so [`AppState`] holds it behind a plain `Arc`. Branch
//! heads are protected by compare-and-swap inside the store, not by a
//! service-wide lock.

use std::sync::Arc;

use chatvc_engine::VersionEngine;
use chatvc_storage::{InMemoryStore, SqliteStore, VersionStore};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Type-erased store so both backends share one state type.
pub type DynStore = Box<dyn VersionStore>;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<VersionEngine<DynStore>>,
}

impl AppState {
    /// Creates a new `AppState` backed by the SQLite database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self, ApiError> {
        let store = SqliteStore::new(db_path)?;
        tracing::info!("opened sqlite store at {}", db_path);
        Ok(Self::with_store(Box::new(store)))
    }

    /// Creates a new `AppState` with the in-memory backend.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(InMemoryStore::new()))
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ApiError> {
        if config.in_memory {
            tracing::warn!("using in-memory store; state is lost on shutdown");
            Ok(Self::in_memory())
        } else {
            Self::new(&config.db_path)
        }
    }

    pub fn with_store(store: DynStore) -> Self {
        AppState {
            engine: Arc::new(VersionEngine::new(store)),
        }
    }
}
