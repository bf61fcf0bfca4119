//! HTTP handler modules for the chatvc API.
//!
//! Each sub-module implements thin handlers that parse requests, check that
//! referenced entities belong to the chat in the path, delegate to the
//! [`chatvc_engine::VersionEngine`], and return JSON responses. No versioning
//! logic lives in handlers.

pub mod branches;
pub mod checkpoints;
pub mod comments;
pub mod compile;
pub mod merge_requests;
pub mod restore;
pub mod version;
