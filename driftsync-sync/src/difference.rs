//! Divergence detection between two sync-path replicas.
//!
//! Compares the tracked file-version state of two replicas and produces
//! the set of records whose version diverges. Detection only: resolution
//! policy (last-writer-wins, merge, manual) belongs to the caller.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use driftsync_types::{FileRecord, SyncPathId};
use std::collections::BTreeMap;

/// Repository collaborator that can list the tracked records of a replica.
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    async fn list_file_records(&self, sync_path_id: SyncPathId) -> SyncResult<Vec<FileRecord>>;
}

/// Which replica holds a one-sided record. `Left`/`Right` follow the
/// argument order of [`between_sync_paths`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One divergent record. Carries enough for a caller to decide a
/// resolution policy: the cross-replica identity (relative path) and the
/// versions seen on each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Relative path: the cross-replica file identity.
    pub path: String,
    pub kind: DivergenceKind,
}

/// How the two replicas disagree about a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivergenceKind {
    /// Present in both replicas with unequal versions.
    VersionMismatch {
        left_version: u64,
        right_version: u64,
    },
    /// Present in exactly one replica. Resolution policy needs the
    /// direction, so the holding side is recorded.
    OnlyOn { side: Side, version: u64 },
}

/// Computes the records whose tracked state diverges between two sync
/// paths.
///
/// Joins both record sets by relative path. A record is divergent when it
/// exists on both sides with unequal `last_version`, or on exactly one
/// side. Equal versions are the no-conflict case and are excluded. The
/// result is ephemeral and owned by the caller; it is never persisted.
///
/// Deterministic and symmetric: swapping the two arguments swaps only the
/// `Left`/`Right` labels, not membership. Results are ordered by path.
pub async fn between_sync_paths(
    store: &dyn FileRecordStore,
    left: SyncPathId,
    right: SyncPathId,
) -> SyncResult<Vec<Divergence>> {
    let left_records = index_by_path(store.list_file_records(left).await?)?;
    let right_records = index_by_path(store.list_file_records(right).await?)?;

    let mut divergences = Vec::new();
    for (path, left_record) in &left_records {
        match right_records.get(path) {
            Some(right_record) => {
                if left_record.last_version != right_record.last_version {
                    divergences.push(Divergence {
                        path: path.clone(),
                        kind: DivergenceKind::VersionMismatch {
                            left_version: left_record.last_version,
                            right_version: right_record.last_version,
                        },
                    });
                }
            }
            None => divergences.push(Divergence {
                path: path.clone(),
                kind: DivergenceKind::OnlyOn {
                    side: Side::Left,
                    version: left_record.last_version,
                },
            }),
        }
    }
    for (path, right_record) in &right_records {
        if !left_records.contains_key(path) {
            divergences.push(Divergence {
                path: path.clone(),
                kind: DivergenceKind::OnlyOn {
                    side: Side::Right,
                    version: right_record.last_version,
                },
            });
        }
    }
    divergences.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(divergences)
}

fn index_by_path(records: Vec<FileRecord>) -> SyncResult<BTreeMap<String, FileRecord>> {
    let mut index = BTreeMap::new();
    for record in records {
        if let Some(previous) = index.insert(record.path.clone(), record) {
            return Err(SyncError::Store(format!(
                "duplicate record for path: {}",
                previous.path
            )));
        }
    }
    Ok(index)
}
