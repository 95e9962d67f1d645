use arrow::datatypes::Date32Type;
use duckdb::{params_from_iter, types::Value, Connection};
use std::path::Path;

use super::Warehouse;
use crate::{error::BackendError, transform::FieldValue};

/// Embedded DuckDB warehouse, for local runs. DuckDB autocommits each
/// statement and understands the same upsert text as Postgres.
pub struct DuckWarehouse {
    conn: Connection,
}

impl DuckWarehouse {
    /// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Open a DuckDB in‐memory database
    pub fn open_in_memory() -> Result<Self, BackendError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_value(value: &FieldValue<'_>) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) => Value::Text(s.to_string()),
        FieldValue::Number(n) => Value::Double(*n),
        FieldValue::Date(d) => Value::Date32(Date32Type::from_naive_date(*d)),
    }
}

impl Warehouse for DuckWarehouse {
    fn probe(&mut self, sql: &str) -> Result<(), BackendError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        rows.next()?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[FieldValue<'_>]) -> Result<u64, BackendError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter().map(to_value)))? as u64)
    }
}
