//! In-memory breadth store for tests and dry runs.

use std::collections::BTreeMap;

use breadth_core::domain::{BreadthRow, Checkpoint, Group, GroupId, GroupKind};
use chrono::NaiveDate;
use parking_lot::Mutex;

use super::{BreadthStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    groups: BTreeMap<GroupId, Group>,
    rows: BTreeMap<GroupId, BTreeMap<NaiveDate, BreadthRow>>,
}

/// Same contract as the SQLite store, held in maps.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    ma_window_count: usize,
}

impl MemoryStore {
    pub fn new(ma_window_count: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ma_window_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().rows.values().map(|r| r.len()).sum()
    }
}

impl BreadthStore for MemoryStore {
    fn reset(&self) -> Result<(), StoreError> {
        *self.inner.lock() = Inner::default();
        Ok(())
    }

    fn ensure_group(&self, kind: GroupKind, name: &str) -> Result<GroupId, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(g) = inner
            .groups
            .values()
            .find(|g| g.kind == kind && g.name == name)
        {
            return Ok(g.id);
        }
        inner.next_id += 1;
        let id = GroupId(inner.next_id);
        inner.groups.insert(
            id,
            Group {
                id,
                kind,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    fn latest_checkpoint(&self, group: GroupId) -> Result<Option<Checkpoint>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .rows
            .get(&group)
            .and_then(|rows| rows.values().next_back())
            .map(BreadthRow::checkpoint))
    }

    fn upsert_rows(&self, group: GroupId, rows: &[BreadthRow]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.groups.contains_key(&group) {
            return Err(StoreError::UnknownGroup(group));
        }
        if let Some(bad) = rows
            .iter()
            .find(|r| r.counters.above_ma.len() != self.ma_window_count)
        {
            return Err(StoreError::WindowCountMismatch {
                group,
                expected: self.ma_window_count,
                found: bad.counters.above_ma.len(),
            });
        }
        let table = inner.rows.entry(group).or_default();
        for row in rows {
            table.insert(row.date, row.clone());
        }
        Ok(rows.len())
    }

    fn groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self.inner.lock().groups.values().cloned().collect())
    }

    fn rows_for_group(&self, group: GroupId) -> Result<Vec<BreadthRow>, StoreError> {
        Ok(self
            .inner
            .lock()
            .rows
            .get(&group)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
