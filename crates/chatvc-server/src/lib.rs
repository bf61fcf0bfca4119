//! HTTP/JSON API for conversation version control.
//!
//! Exposes the [`chatvc_engine::VersionEngine`] operations (branches,
//! checkpoints, compile, restore, merge requests, comments) as a REST API.
//! This crate contains the server framework, API schema types, error
//! handling, configuration and route definitions.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod state;
