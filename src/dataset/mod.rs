// src/dataset/mod.rs

pub mod batch;
pub mod snapshot;

use tracing::{error, info};

use crate::{
    error::AggregateError,
    transform::{CanonicalColumn, CanonicalRecord, RecordSet},
};

pub use snapshot::{read_snapshot, write_snapshot};

/// Every record of one run, in processing order, with the column order the
/// warehouse load and the snapshot use.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedDataset {
    columns: Vec<CanonicalColumn>,
    records: Vec<CanonicalRecord>,
}

impl UnifiedDataset {
    pub fn new(columns: Vec<CanonicalColumn>, records: Vec<CanonicalRecord>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[CanonicalColumn] {
        &self.columns
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Concatenate per-file record sets in the order given.
///
/// `failed` is the number of inbound files that never produced a record set;
/// it only feeds the error when nothing survives.
pub fn aggregate(
    columns: &[CanonicalColumn],
    record_sets: Vec<RecordSet>,
    failed: usize,
) -> Result<UnifiedDataset, AggregateError> {
    let normalized = record_sets.len();
    let records: Vec<CanonicalRecord> = record_sets
        .into_iter()
        .flat_map(|set| set.records)
        .collect();

    if records.is_empty() {
        let err = AggregateError::Empty { normalized, failed };
        error!(error = %err, "Nothing to aggregate");
        return Err(err);
    }

    info!(files = normalized, records = records.len(), "Datasets aggregated");
    Ok(UnifiedDataset::new(columns.to_vec(), records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn set(grazer: &str, areas: &[&str]) -> RecordSet {
        RecordSet {
            records: areas
                .iter()
                .map(|a| CanonicalRecord {
                    area: a.to_string(),
                    number_of_animal_units: 1.0,
                    comments: None,
                    grazer: grazer.into(),
                    reporting_date: NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(),
                })
                .collect(),
            candidates: areas.len(),
            dropped: 0,
        }
    }

    #[test]
    fn concatenates_in_processing_order() {
        let columns = [CanonicalColumn::Area, CanonicalColumn::Grazer];
        let data = aggregate(
            &columns,
            vec![set("a", &["North", "South"]), set("b", &[]), set("c", &["Creek"])],
            1,
        )
        .unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data.columns(), &columns);
        let order: Vec<_> = data
            .records()
            .iter()
            .map(|r| (r.grazer.as_str(), r.area.as_str()))
            .collect();
        assert_eq!(order, [("a", "North"), ("a", "South"), ("c", "Creek")]);
    }

    #[test]
    fn empty_aggregate_is_an_error() {
        let err = aggregate(&[CanonicalColumn::Area], vec![set("a", &[])], 2).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Empty {
                normalized: 1,
                failed: 2
            }
        ));
        assert!(aggregate(&[CanonicalColumn::Area], Vec::new(), 0).is_err());
    }
}
