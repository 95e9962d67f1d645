// src/error.rs

use std::{io, path::PathBuf};
use thiserror::Error;

/// Driver-level failure reported by a warehouse backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single document could not be turned into a raw table.
/// Isolated to that file: the run logs it and moves on.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{action}: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Tool {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not finish within {secs}s and was killed")]
    Timeout { program: String, secs: u64 },

    #[error("malformed OCR output: {0}")]
    Ocr(String),

    #[error("no table detected in {}", .0.display())]
    NoTable(PathBuf),
}

/// A raw table did not have the shape of a grazing report.
/// Isolated to that file, like [`ExtractError`].
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("table has {rows} rows, at least {min} are required")]
    TooFewRows { rows: usize, min: usize },

    #[error("table has {width} columns, expected {expected}")]
    Width { width: usize, expected: usize },

    #[error("grazer cell (row 0, column 1) is empty")]
    MissingGrazer,

    #[error("reporting date cell (row 1, column 1) is empty")]
    MissingReportingDate,

    #[error("reporting date {text:?} does not match \"Month Day, Year\": {source}")]
    ReportingDate {
        text: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("no records to load ({normalized} file(s) normalized, {failed} failed)")]
    Empty { normalized: usize, failed: usize },
}

/// Failures while writing to the warehouse. Every variant is fatal to the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not connect to warehouse database {database}: {source}")]
    Connection {
        database: String,
        #[source]
        source: BackendError,
    },

    #[error("missing warehouse credential: environment variable {0} is not set")]
    MissingCredentials(&'static str),

    #[error("destination table {table} failed verification: {source}")]
    Verification {
        table: String,
        #[source]
        source: BackendError,
    },

    #[error("could not build upsert statement: {0}")]
    Statement(#[source] crate::load::sql::SqlError),

    #[error("row {row} cannot be bound: {source}")]
    RowValue {
        row: usize,
        #[source]
        source: crate::load::sql::SqlError,
    },

    #[error("upsert of row {row} into {table} failed after {committed} committed row(s): {source}")]
    RowUpsert {
        table: String,
        row: usize,
        committed: u64,
        #[source]
        source: BackendError,
    },
}
