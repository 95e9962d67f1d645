// src/load/sql.rs
//
// Statement text shared by every backend. Identifiers are double-quoted;
// values never appear in the text and travel as bind parameters.

use thiserror::Error;

use super::TableTarget;
use crate::transform::{CanonicalColumn, FieldValue};

#[derive(Error, Debug, PartialEq)]
pub enum SqlError {
    #[error("identifier is empty")]
    EmptyIdentifier,
    #[error("value contains a NUL character")]
    NulCharacter,
    #[error("number {0} is not finite")]
    NonFinite(f64),
}

/// `"name"`, with embedded quotes doubled.
pub fn quote_ident(ident: &str) -> Result<String, SqlError> {
    if ident.is_empty() {
        return Err(SqlError::EmptyIdentifier);
    }
    if ident.contains('\0') {
        return Err(SqlError::NulCharacter);
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

/// Reject values no backend stores faithfully.
pub fn check_value(value: &FieldValue<'_>) -> Result<(), SqlError> {
    match value {
        FieldValue::Text(s) if s.contains('\0') => Err(SqlError::NulCharacter),
        FieldValue::Number(n) if !n.is_finite() => Err(SqlError::NonFinite(*n)),
        _ => Ok(()),
    }
}

/// Type every placeholder is cast to, spelled so Postgres and DuckDB agree.
fn bind_type(column: CanonicalColumn) -> &'static str {
    match column {
        CanonicalColumn::Area | CanonicalColumn::Comments | CanonicalColumn::Grazer => "text",
        CanonicalColumn::NumberOfAnimalUnits => "float8",
        CanonicalColumn::ReportingDate => "date",
    }
}

fn ident_list(columns: &[CanonicalColumn]) -> Result<String, SqlError> {
    Ok(columns
        .iter()
        .map(|c| quote_ident(c.name()))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

impl TableTarget {
    /// `"schema"."table"`
    pub fn qualified_name(&self) -> Result<String, SqlError> {
        Ok(format!(
            "{}.{}",
            quote_ident(&self.schema)?,
            quote_ident(&self.table)?
        ))
    }

    /// Bounded existence check: touches at most one row.
    pub fn probe_sql(&self) -> Result<String, SqlError> {
        Ok(format!("SELECT 1 FROM {} LIMIT 1", self.qualified_name()?))
    }

    /// Single-row insert that, on a key conflict, only refreshes the update
    /// column and the edited-on timestamp. `placeholder` spells the n-th
    /// (1-based) parameter; values are bound in `columns` order.
    pub fn upsert_sql(
        &self,
        columns: &[CanonicalColumn],
        placeholder: impl Fn(usize) -> String,
    ) -> Result<String, SqlError> {
        let values = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}::{}", placeholder(i + 1), bind_type(*c)))
            .collect::<Vec<_>>()
            .join(", ");
        let update = quote_ident(self.update_column.name())?;

        Ok(format!(
            "INSERT INTO {table} ({columns}) VALUES ({values}) \
             ON CONFLICT ({key}) DO UPDATE SET {update} = excluded.{update}, {edited_on} = now()",
            table = self.qualified_name()?,
            columns = ident_list(columns)?,
            values = values,
            key = ident_list(&self.prim_key)?,
            update = update,
            edited_on = quote_ident(&self.edited_on_column)?,
        ))
    }
}
