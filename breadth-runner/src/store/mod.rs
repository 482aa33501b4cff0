//! Breadth store — persisted `(group_id, date)` aggregate rows.
//!
//! The `BreadthStore` trait is the boundary the pipeline writes through.
//! `SqliteStore` is the production implementation; `MemoryStore` backs tests.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use schema::breadth_columns;
pub use sqlite::SqliteStore;

use breadth_core::domain::{BreadthRow, Checkpoint, Group, GroupId, GroupKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("breadth table columns {found:?} do not match configured columns {expected:?}; run a full rebuild")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row for group {group} has {found} moving-average counters, store expects {expected}")]
    WindowCountMismatch {
        group: GroupId,
        expected: usize,
        found: usize,
    },

    #[error("unknown group kind '{0}' in store")]
    UnknownKind(String),

    #[error("group {0} is not registered in the store")]
    UnknownGroup(GroupId),
}

/// Keyed table of breadth rows.
///
/// Writes are idempotent: upserting the same `(group, date)` twice leaves one
/// row holding the latest values.
pub trait BreadthStore: Send + Sync {
    /// Drop and recreate all tables.
    fn reset(&self) -> Result<(), StoreError>;

    /// Get-or-create the id of a group.
    fn ensure_group(&self, kind: GroupKind, name: &str) -> Result<GroupId, StoreError>;

    /// Latest persisted row of a group as a smoothing checkpoint.
    fn latest_checkpoint(&self, group: GroupId) -> Result<Option<Checkpoint>, StoreError>;

    /// Upsert rows of one group atomically. Returns the number of rows written.
    fn upsert_rows(&self, group: GroupId, rows: &[BreadthRow]) -> Result<usize, StoreError>;

    /// All groups, ordered by id.
    fn groups(&self) -> Result<Vec<Group>, StoreError>;

    /// All rows of a group, ordered by date.
    fn rows_for_group(&self, group: GroupId) -> Result<Vec<BreadthRow>, StoreError>;

    /// Every group's row on the most recent date present in the store,
    /// ordered by kind label then name.
    fn latest_snapshot(&self) -> Result<Vec<(Group, BreadthRow)>, StoreError> {
        let groups = self.groups()?;
        let mut latest: Vec<(Group, BreadthRow)> = Vec::new();
        for group in groups {
            if let Some(row) = self.rows_for_group(group.id)?.pop() {
                latest.push((group, row));
            }
        }
        let Some(max_date) = latest.iter().map(|(_, r)| r.date).max() else {
            return Ok(Vec::new());
        };
        latest.retain(|(_, r)| r.date == max_date);
        latest.sort_by(|(a, _), (b, _)| {
            a.kind
                .as_str()
                .cmp(b.kind.as_str())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(latest)
    }

    /// BLAKE3 digest of every group and row in key order.
    ///
    /// Two stores with equal digests hold identical contents.
    fn digest(&self) -> Result<String, StoreError> {
        let mut hasher = blake3::Hasher::new();
        for group in self.groups()? {
            hasher.update(&serde_json::to_vec(&group)?);
            for row in self.rows_for_group(group.id)? {
                hasher.update(&serde_json::to_vec(&row)?);
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}
