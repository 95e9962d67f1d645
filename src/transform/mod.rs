// src/transform/mod.rs

pub mod alias;
pub mod date_parser;
pub mod utils;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::{error::NormalizeError, extract::RawTable};

pub use alias::AreaAliases;

/// Rows 0 and 1 carry metadata, row 2 separates them from the body.
const BODY_START: usize = 3;
/// Two metadata rows, the separator, at least the trailing total.
pub const MIN_ROWS: usize = 4;
/// area, number_of_animal_units, comments
pub const BODY_WIDTH: usize = 3;

/// The columns of the target table, named as they are in the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalColumn {
    Area,
    NumberOfAnimalUnits,
    Comments,
    Grazer,
    ReportingDate,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 5] = [
        CanonicalColumn::Area,
        CanonicalColumn::NumberOfAnimalUnits,
        CanonicalColumn::Comments,
        CanonicalColumn::Grazer,
        CanonicalColumn::ReportingDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalColumn::Area => "area",
            CanonicalColumn::NumberOfAnimalUnits => "number_of_animal_units",
            CanonicalColumn::Comments => "comments",
            CanonicalColumn::Grazer => "grazer",
            CanonicalColumn::ReportingDate => "reporting_date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Only `comments` may be null in a canonical record.
    pub fn nullable(self) -> bool {
        matches!(self, CanonicalColumn::Comments)
    }
}

impl fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed, typed view of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Null,
    Text(&'a str),
    Number(f64),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub area: String,
    pub number_of_animal_units: f64,
    pub comments: Option<String>,
    pub grazer: String,
    pub reporting_date: NaiveDate,
}

impl CanonicalRecord {
    pub fn get(&self, column: CanonicalColumn) -> FieldValue<'_> {
        match column {
            CanonicalColumn::Area => FieldValue::Text(&self.area),
            CanonicalColumn::NumberOfAnimalUnits => FieldValue::Number(self.number_of_animal_units),
            CanonicalColumn::Comments => self
                .comments
                .as_deref()
                .map_or(FieldValue::Null, FieldValue::Text),
            CanonicalColumn::Grazer => FieldValue::Text(&self.grazer),
            CanonicalColumn::ReportingDate => FieldValue::Date(self.reporting_date),
        }
    }
}

/// One file's normalized rows. Projection to the configured column order
/// happens once the sets are aggregated.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub records: Vec<CanonicalRecord>,
    /// Body rows considered before null filtering.
    pub candidates: usize,
    /// Body rows dropped for a missing area or animal-unit count.
    pub dropped: usize,
}

/// Turn a raw report table into canonical records.
///
/// Rows missing an area or a usable animal-unit count are dropped; a table of
/// the wrong shape, a blank grazer, or an unparseable reporting date fails the
/// whole file.
#[tracing::instrument(level = "debug", skip_all, fields(rows = table.height()))]
pub fn normalize(table: &RawTable, aliases: &AreaAliases) -> Result<RecordSet, NormalizeError> {
    let result = normalize_inner(table, aliases);
    match &result {
        Ok(set) => info!(
            records = set.records.len(),
            dropped = set.dropped,
            "Data successfully transformed."
        ),
        Err(err) => error!(error = ?err, "Data transformation failed: {}", err),
    }
    result
}

fn normalize_inner(table: &RawTable, aliases: &AreaAliases) -> Result<RecordSet, NormalizeError> {
    let rows = table.rows();
    if rows.len() < MIN_ROWS {
        return Err(NormalizeError::TooFewRows {
            rows: rows.len(),
            min: MIN_ROWS,
        });
    }
    if table.width() != BODY_WIDTH {
        return Err(NormalizeError::Width {
            width: table.width(),
            expected: BODY_WIDTH,
        });
    }

    // 1) metadata cells
    let grazer = utils::non_empty(table.cell(0, 1)).ok_or(NormalizeError::MissingGrazer)?;
    let date_text =
        utils::non_empty(table.cell(1, 1)).ok_or(NormalizeError::MissingReportingDate)?;
    let reporting_date = date_parser::parse_reporting_date(&date_text).map_err(|source| {
        NormalizeError::ReportingDate {
            text: date_text.clone(),
            source,
        }
    })?;

    // 2) body: drop metadata, separator and the trailing total
    let body = &rows[BODY_START..rows.len() - 1];

    // 3) positional columns, null filter, alias substitution
    let mut records = Vec::with_capacity(body.len());
    let mut dropped = 0;
    for (idx, row) in body.iter().enumerate() {
        let area = utils::non_empty(row[0].as_deref());
        let units_text = utils::non_empty(row[1].as_deref());
        let units = units_text.as_deref().and_then(utils::parse_number);

        let (Some(area), Some(units)) = (area, units) else {
            if let (Some(text), None) = (&units_text, units) {
                warn!(row = BODY_START + idx, value = %text, "animal units are not numeric; row dropped");
            } else {
                debug!(row = BODY_START + idx, "row without area or animal units dropped");
            }
            dropped += 1;
            continue;
        };

        records.push(CanonicalRecord {
            area: aliases.apply(&area).to_string(),
            number_of_animal_units: units,
            comments: utils::non_empty(row[2].as_deref()),
            grazer: grazer.clone(),
            reporting_date,
        });
    }

    Ok(RecordSet {
        records,
        candidates: body.len(),
        dropped,
    })
}
