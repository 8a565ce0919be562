use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, ShopfloorError};
use crate::models::{Row, Stage};
use crate::table::{self, key_field, row_key, Payload, TableApi, TableOp};

pub const DB_FILE: &str = "shopfloor.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS table_rows (
    id INTEGER PRIMARY KEY,
    table_name TEXT NOT NULL,
    row_key TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE (table_name, row_key)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    checksum TEXT NOT NULL
);
";

const DEFAULT_STAGES: &[&str] = &[
    "Cắt thô",
    "Bào, lựa phôi",
    "Finger ghép dọc 1",
    "Finger ghép dọc 2",
    "Bào tinh ghép ngang",
    "Trám trít",
    "Chà nhám - kiểm hàng",
    "Nhập kho thành phẩm",
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row(
        "SELECT count(*) FROM table_rows WHERE table_name = ?1",
        [table::STAGES],
        |row| row.get(0),
    )?;
    if count == 0 {
        for name in DEFAULT_STAGES {
            let stage = Stage {
                name: name.to_string(),
                unit_price: "0".to_string(),
                note: String::new(),
            };
            let data = serde_json::to_string(&stage)?;
            conn.execute(
                "INSERT INTO table_rows (table_name, row_key, data) VALUES (?1, ?2, ?3)",
                rusqlite::params![table::STAGES, name, data],
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Local table backend
// ---------------------------------------------------------------------------

/// Table API over a local SQLite file. Each request runs in one transaction,
/// so a rejected Add leaves none of its rows behind.
pub struct SqliteTable {
    conn: Connection,
}

impl SqliteTable {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn find_rows(&self, table: &str) -> Result<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM table_rows WHERE table_name = ?1 ORDER BY id")?;
        let raw: Vec<String> = stmt
            .query_map([table], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut rows = Vec::with_capacity(raw.len());
        for data in raw {
            rows.push(serde_json::from_str(&data)?);
        }
        Ok(rows)
    }

    fn load_row(&self, table: &str, key: &str) -> Result<Option<Row>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM table_rows WHERE table_name = ?1 AND row_key = ?2",
                rusqlite::params![table, key],
                |row| row.get(0),
            )
            .optional()?;
        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    fn require_key(table: &str, row: &Row) -> Result<String> {
        row_key(table, row).ok_or_else(|| {
            ShopfloorError::Transport(format!(
                "row in {table} is missing its key field '{}'",
                key_field(table)
            ))
        })
    }

    fn add_rows(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let tx = self.conn.unchecked_transaction()?;
        for row in &rows {
            let key = Self::require_key(table, row)?;
            let exists: bool = tx
                .prepare_cached("SELECT 1 FROM table_rows WHERE table_name = ?1 AND row_key = ?2")?
                .exists(rusqlite::params![table, key])?;
            if exists {
                return Err(ShopfloorError::Transport(format!(
                    "{table} already has a row with key {key}"
                )));
            }
            tx.execute(
                "INSERT INTO table_rows (table_name, row_key, data) VALUES (?1, ?2, ?3)",
                rusqlite::params![table, key, serde_json::to_string(row)?],
            )?;
        }
        tx.commit()?;
        Ok(rows)
    }

    fn edit_rows(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let key = Self::require_key(table, &row)?;
            let mut merged = self.load_row(table, &key)?.ok_or_else(|| {
                ShopfloorError::Transport(format!("{table} has no row with key {key}"))
            })?;
            for (field, value) in row {
                merged.insert(field, value);
            }
            tx.execute(
                "UPDATE table_rows SET data = ?1, updated_at = datetime('now') \
                 WHERE table_name = ?2 AND row_key = ?3",
                rusqlite::params![serde_json::to_string(&merged)?, table, key],
            )?;
            stored.push(merged);
        }
        tx.commit()?;
        Ok(stored)
    }

    fn delete_rows(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let tx = self.conn.unchecked_transaction()?;
        for row in &rows {
            let key = Self::require_key(table, row)?;
            tx.execute(
                "DELETE FROM table_rows WHERE table_name = ?1 AND row_key = ?2",
                rusqlite::params![table, key],
            )?;
        }
        tx.commit()?;
        Ok(Vec::new())
    }
}

impl TableApi for SqliteTable {
    fn request(&self, table: &str, op: TableOp, payload: Payload) -> Result<Vec<Row>> {
        debug!(table, %op, rows = payload.rows.len(), "local table request");
        match op {
            TableOp::Find => self.find_rows(table),
            TableOp::Add => self.add_rows(table, payload.rows),
            TableOp::Edit => self.edit_rows(table, payload.rows),
            TableOp::Delete => self.delete_rows(table, payload.rows),
        }
    }
}

// ---------------------------------------------------------------------------
// Import log
// ---------------------------------------------------------------------------

pub fn import_seen(conn: &Connection, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
    Ok(stmt.exists([checksum])?)
}

pub fn record_import(conn: &Connection, filename: &str, checksum: &str, record_count: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (filename, record_count, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![filename, record_count as i64, checksum],
    )?;
    Ok(())
}
