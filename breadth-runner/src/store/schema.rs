//! SQLite schema for the breadth store.
//!
//! The `breadth` table carries one `above_ma{w}` column per configured
//! window, so its layout is a function of the engine configuration.

use rusqlite::Connection;

use super::StoreError;

const GROUPS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS groups (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    UNIQUE(type, name)
);";

const LEADING_COLUMNS: [&str; 7] = [
    "group_id",
    "date",
    "total",
    "adv",
    "dec",
    "new_high_52w",
    "new_low_52w",
];

const TRAILING_COLUMNS: [&str; 6] = [
    "spike_up",
    "spike_down",
    "ad_value",
    "ema19",
    "ema39",
    "mcclellan",
];

/// Ordered column names of the `breadth` table for the given windows.
pub fn breadth_columns(ma_windows: &[usize]) -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(ma_windows.iter().map(|w| format!("above_ma{w}")))
        .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
        .collect()
}

fn breadth_table_sql(ma_windows: &[usize]) -> String {
    let ma_columns: String = ma_windows
        .iter()
        .map(|w| format!("    above_ma{w} INTEGER NOT NULL,\n"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS breadth (
    group_id     INTEGER NOT NULL,
    date         TEXT    NOT NULL,
    total        INTEGER NOT NULL,
    adv          INTEGER NOT NULL,
    dec          INTEGER NOT NULL,
    new_high_52w INTEGER NOT NULL,
    new_low_52w  INTEGER NOT NULL,
{ma_columns}    spike_up     INTEGER NOT NULL,
    spike_down   INTEGER NOT NULL,
    ad_value     INTEGER NOT NULL,
    ema19        REAL,
    ema39        REAL,
    mcclellan    REAL,
    PRIMARY KEY (group_id, date),
    FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
);"
    )
}

/// `INSERT OR REPLACE` statement with one positional parameter per column.
pub(crate) fn upsert_sql(ma_windows: &[usize]) -> String {
    let columns = breadth_columns(ma_windows);
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT OR REPLACE INTO breadth ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Create both tables if missing and check an existing `breadth` table.
pub(crate) fn ensure_schema(conn: &Connection, ma_windows: &[usize]) -> Result<(), StoreError> {
    conn.execute_batch(GROUPS_TABLE)?;
    conn.execute_batch(&breadth_table_sql(ma_windows))?;
    verify_breadth_columns(conn, ma_windows)
}

/// Drop and recreate both tables.
pub(crate) fn recreate(conn: &Connection, ma_windows: &[usize]) -> Result<(), StoreError> {
    conn.execute_batch("DROP TABLE IF EXISTS breadth; DROP TABLE IF EXISTS groups;")?;
    tracing::info!("Dropped breadth tables");
    ensure_schema(conn, ma_windows)
}

fn verify_breadth_columns(conn: &Connection, ma_windows: &[usize]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('breadth') ORDER BY cid")?;
    let found = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let expected = breadth_columns(ma_windows);
    if found != expected {
        return Err(StoreError::SchemaMismatch { expected, found });
    }
    Ok(())
}
