//! Core type definitions for Driftsync.
//!
//! This crate defines the fundamental types shared across the sync layer:
//! - Peer, sync-path, and file identifiers (UUID-backed)
//! - `SyncPath`: a locally and remotely shared folder with its secret
//! - `FileRecord`: the tracked version state of one file in a replica
//!
//! Everything transport- or reconciliation-specific lives in
//! `driftsync-sync`, not here.

mod ids;
mod record;

pub use ids::{FileId, PeerId, SyncPathId};
pub use record::{FileRecord, SyncPath};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
