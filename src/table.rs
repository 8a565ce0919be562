use std::fmt;

use serde_json::Value;

use crate::error::Result;
use crate::models::{Row, FIELD_ID, STAFF_KEY, STAGE_KEY};

pub const REPORTS: &str = "BC";
pub const STAFF: &str = "DSNV";
pub const STAGES: &str = "CONGDOAN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOp {
    Find,
    Add,
    Edit,
    Delete,
}

impl TableOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Find => "Find",
            Self::Add => "Add",
            Self::Edit => "Edit",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for TableOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub rows: Vec<Row>,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Delete payload: only the key field of each row.
    pub fn keys(table: &str, keys: &[String]) -> Self {
        let field = key_field(table);
        let rows = keys
            .iter()
            .map(|k| {
                let mut row = Row::new();
                row.insert(field.to_string(), Value::String(k.clone()));
                row
            })
            .collect();
        Self { rows }
    }
}

pub fn key_field(table: &str) -> &'static str {
    match table {
        STAFF => STAFF_KEY,
        STAGES => STAGE_KEY,
        _ => FIELD_ID,
    }
}

pub fn row_key(table: &str, row: &Row) -> Option<String> {
    match row.get(key_field(table))? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A Find/Add/Edit/Delete service over named tables. Implementations never
/// retry; every failure comes back as a transport error.
pub trait TableApi {
    fn request(&self, table: &str, op: TableOp, payload: Payload) -> Result<Vec<Row>>;

    fn find(&self, table: &str) -> Result<Vec<Row>> {
        self.request(table, TableOp::Find, Payload::empty())
    }
}

impl<T: TableApi + ?Sized> TableApi for Box<T> {
    fn request(&self, table: &str, op: TableOp, payload: Payload) -> Result<Vec<Row>> {
        (**self).request(table, op, payload)
    }
}
