//! Sync path and file record types.

use crate::{FileId, SyncPathId};
use serde::{Deserialize, Serialize};

/// A locally and remotely shared folder.
///
/// The `guid` is the public identifier exchanged during the handshake.
/// The `password` is the shared read/write secret that both replicas must
/// prove knowledge of before syncing; it is never sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPath {
    /// Public identifier, stable across replicas.
    pub guid: SyncPathId,
    /// Local filesystem root of the folder.
    pub root: String,
    /// Shared read/write secret.
    pub password: String,
}

impl SyncPath {
    /// Creates a new sync path with a fresh GUID.
    pub fn new(root: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            guid: SyncPathId::new(),
            root: root.into(),
            password: password.into(),
        }
    }
}

/// The tracked state of one file in a replica.
///
/// `last_version` is a monotonic per-file revision counter maintained by
/// the scanner; two replicas agree on a file exactly when their records
/// carry the same `last_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Replica-local identity.
    pub id: FileId,
    /// The sync path this record belongs to.
    pub sync_path_id: SyncPathId,
    /// Path relative to the sync path root. Cross-replica identity.
    pub path: String,
    /// Monotonic revision marker.
    pub last_version: u64,
    /// Whether the file is currently present (false = tracked deletion).
    pub present: bool,
}

impl FileRecord {
    /// Creates a record for a present file.
    pub fn new(sync_path_id: SyncPathId, path: impl Into<String>, last_version: u64) -> Self {
        Self {
            id: FileId::new(),
            sync_path_id,
            path: path.into(),
            last_version,
            present: true,
        }
    }

    /// Marks the record as a tracked deletion, bumping the version.
    pub fn mark_deleted(&mut self) {
        self.present = false;
        self.last_version += 1;
    }

    /// Records a new revision of the file.
    pub fn bump_version(&mut self) {
        self.last_version += 1;
    }
}
