//! rusqlite-backed breadth store.

use std::path::Path;

use breadth_core::domain::{
    BreadthRow, Checkpoint, Group, GroupDayCounters, GroupId, GroupKind,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::schema;
use super::{BreadthStore, StoreError};

/// Breadth store on a single SQLite connection.
///
/// The connection sits behind a mutex; every trait method takes it for the
/// duration of one statement or one transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    ma_windows: Vec<usize>,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path` for the given windows.
    pub fn open(path: &Path, ma_windows: &[usize]) -> Result<Self, StoreError> {
        Self::with_connection(connect(path)?, ma_windows)
    }

    /// Open `path` without creating or checking any table.
    ///
    /// The tables are laid out by the first [`BreadthStore::reset`], which
    /// must come before any other call. A full rebuild uses this to replace a
    /// store whose columns no longer match the configured windows.
    pub fn open_for_rebuild(path: &Path, ma_windows: &[usize]) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(connect(path)?),
            ma_windows: ma_windows.to_vec(),
        })
    }

    pub fn open_in_memory(ma_windows: &[usize]) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn, ma_windows)
    }

    fn with_connection(conn: Connection, ma_windows: &[usize]) -> Result<Self, StoreError> {
        schema::ensure_schema(&conn, ma_windows)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ma_windows: ma_windows.to_vec(),
        })
    }

    pub fn ma_windows(&self) -> &[usize] {
        &self.ma_windows
    }

    /// Number of rows in the `breadth` table.
    pub fn row_count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM breadth", [], |row| row.get(0))?;
        Ok(count)
    }

    fn select_columns(&self) -> String {
        schema::breadth_columns(&self.ma_windows)
            .iter()
            .skip(1)
            .map(|c| format!("b.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn row_values(&self, group: GroupId, row: &BreadthRow) -> Result<Vec<Value>, StoreError> {
        let c = &row.counters;
        if c.above_ma.len() != self.ma_windows.len() {
            return Err(StoreError::WindowCountMismatch {
                group,
                expected: self.ma_windows.len(),
                found: c.above_ma.len(),
            });
        }
        let mut values = Vec::with_capacity(self.ma_windows.len() + 13);
        values.push(Value::Integer(group.0));
        values.push(Value::Text(row.date.format("%Y-%m-%d").to_string()));
        for n in [c.total, c.adv, c.dec, c.new_high_52w, c.new_low_52w] {
            values.push(Value::Integer(i64::from(n)));
        }
        values.extend(c.above_ma.iter().map(|&n| Value::Integer(i64::from(n))));
        values.push(Value::Integer(i64::from(c.spike_up)));
        values.push(Value::Integer(i64::from(c.spike_down)));
        values.push(Value::Integer(row.ad_value));
        for v in [row.ema_short, row.ema_long, row.mcclellan] {
            values.push(v.map_or(Value::Null, Value::Real));
        }
        Ok(values)
    }
}

/// Decode a row selected as `date, total, ..., mcclellan` starting at `offset`.
fn read_breadth_row(row: &Row<'_>, offset: usize, window_count: usize) -> rusqlite::Result<BreadthRow> {
    let date: NaiveDate = row.get(offset)?;
    let mut counters = GroupDayCounters::new(window_count);
    counters.total = row.get(offset + 1)?;
    counters.adv = row.get(offset + 2)?;
    counters.dec = row.get(offset + 3)?;
    counters.new_high_52w = row.get(offset + 4)?;
    counters.new_low_52w = row.get(offset + 5)?;
    let mut idx = offset + 6;
    for slot in counters.above_ma.iter_mut() {
        *slot = row.get(idx)?;
        idx += 1;
    }
    counters.spike_up = row.get(idx)?;
    counters.spike_down = row.get(idx + 1)?;
    Ok(BreadthRow {
        date,
        counters,
        ad_value: row.get(idx + 2)?,
        ema_short: row.get(idx + 3)?,
        ema_long: row.get(idx + 4)?,
        mcclellan: row.get(idx + 5)?,
    })
}

fn read_group(id: i64, kind: &str, name: String) -> Result<Group, StoreError> {
    let kind: GroupKind = kind
        .parse()
        .map_err(|_| StoreError::UnknownKind(kind.to_string()))?;
    Ok(Group {
        id: GroupId(id),
        kind,
        name,
    })
}

fn connect(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

impl BreadthStore for SqliteStore {
    fn reset(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        schema::recreate(&conn, &self.ma_windows)
    }

    fn ensure_group(&self, kind: GroupKind, name: &str) -> Result<GroupId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO groups (type, name) VALUES (?1, ?2)",
            params![kind.as_str(), name],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM groups WHERE type = ?1 AND name = ?2",
            params![kind.as_str(), name],
            |row| row.get(0),
        )?;
        Ok(GroupId(id))
    }

    fn latest_checkpoint(&self, group: GroupId) -> Result<Option<Checkpoint>, StoreError> {
        let conn = self.conn.lock();
        let latest = conn
            .query_row(
                "SELECT date, ema19, ema39 FROM breadth
                 WHERE group_id = ?1
                 ORDER BY date DESC
                 LIMIT 1",
                params![group.0],
                |row| {
                    Ok((
                        row.get::<_, NaiveDate>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(latest.map(|(date, ema_short, ema_long)| Checkpoint {
            date,
            ema_short,
            ema_long,
        }))
    }

    fn upsert_rows(&self, group: GroupId, rows: &[BreadthRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&schema::upsert_sql(&self.ma_windows))?;
            for row in rows {
                stmt.execute(params_from_iter(self.row_values(group, row)?))?;
            }
        }
        tx.commit()?;

        tracing::debug!(group = group.0, rows = rows.len(), "Upserted breadth rows");
        Ok(rows.len())
    }

    fn groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, type, name FROM groups ORDER BY id")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, kind, name)| read_group(id, &kind, name))
            .collect()
    }

    fn rows_for_group(&self, group: GroupId) -> Result<Vec<BreadthRow>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM breadth b WHERE b.group_id = ?1 ORDER BY b.date",
            self.select_columns()
        );
        let mut stmt = conn.prepare(&sql)?;
        let window_count = self.ma_windows.len();
        let rows = stmt
            .query_map(params![group.0], |row| read_breadth_row(row, 0, window_count))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn latest_snapshot(&self) -> Result<Vec<(Group, BreadthRow)>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT g.id, g.type, g.name, {}
             FROM breadth b
             JOIN groups g ON g.id = b.group_id
             WHERE b.date = (SELECT MAX(date) FROM breadth)
             ORDER BY g.type, g.name",
            self.select_columns()
        );
        let mut stmt = conn.prepare(&sql)?;
        let window_count = self.ma_windows.len();
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    read_breadth_row(row, 3, window_count)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, kind, name, row)| Ok((read_group(id, &kind, name)?, row)))
            .collect()
    }
}
