// src/extract/mod.rs

pub mod command;
pub mod layout;
pub mod tesseract;

use std::path::Path;
use tracing::{error, info};

use crate::error::ExtractError;

pub use tesseract::TesseractDetector;

/// Pages handed to the detector. Grazing reports keep their table on page 1.
pub const FIRST_PAGE: [usize; 1] = [1];

/// One table as the OCR engine saw it: rows of optional cell text, no schema.
/// Rows are padded to a common width so every `(row, column)` is addressable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    rows: Vec<Vec<Option<String>>>,
    width: usize,
}

impl RawTable {
    /// Build from possibly ragged rows. Blank cells become `None`.
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<Option<String>> = row
                    .into_iter()
                    .map(|cell| cell.filter(|text| !text.trim().is_empty()))
                    .collect();
                row.resize(width, None);
                row
            })
            .collect();
        Self { rows, width }
    }

    /// Convenience for literal tables where `""` marks an empty cell.
    pub fn from_text<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| Some(cell.as_ref().to_string()))
                        .collect()
                })
                .collect(),
        )
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }
}

/// The OCR/table-detection capability: given a document and a page set,
/// return whatever tables it finds, in reading order.
pub trait TableDetector {
    fn detect(&self, path: &Path, pages: &[usize]) -> Result<Vec<RawTable>, ExtractError>;
}

/// Run the detector over the first page of `path` and keep the first table.
#[tracing::instrument(level = "info", skip(detector), fields(path = %path.display()))]
pub fn extract(path: &Path, detector: &dyn TableDetector) -> Result<RawTable, ExtractError> {
    let result = detector.detect(path, &FIRST_PAGE).and_then(|tables| {
        tables
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::NoTable(path.to_path_buf()))
    });

    match &result {
        Ok(table) => info!(
            rows = table.height(),
            columns = table.width(),
            "Table successfully extracted from pdf {}",
            path.display()
        ),
        Err(err) => error!(error = ?err, "Table extraction failed for {}: {}", path.display(), err),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FixedDetector(Vec<RawTable>);

    impl TableDetector for FixedDetector {
        fn detect(&self, _path: &Path, pages: &[usize]) -> Result<Vec<RawTable>, ExtractError> {
            assert_eq!(pages, &FIRST_PAGE);
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl TableDetector for FailingDetector {
        fn detect(&self, _path: &Path, _pages: &[usize]) -> Result<Vec<RawTable>, ExtractError> {
            Err(ExtractError::Ocr("garbled".into()))
        }
    }

    #[test]
    fn new_pads_ragged_rows_and_blanks() {
        let table = RawTable::new(vec![
            vec![Some("a".into())],
            vec![Some("b".into()), Some("  ".into()), Some("c".into())],
        ]);
        assert_eq!(table.width(), 3);
        assert_eq!(table.rows()[0], vec![Some("a".to_string()), None, None]);
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(1, 2), Some("c"));
        assert_eq!(table.cell(5, 0), None);
    }

    #[test]
    fn extract_keeps_first_table() {
        let first = RawTable::from_text(&[vec!["first"]]);
        let second = RawTable::from_text(&[vec!["second"]]);
        let detector = FixedDetector(vec![first.clone(), second]);
        let table = extract(Path::new("report.pdf"), &detector).unwrap();
        assert_eq!(table, first);
    }

    #[test]
    fn extract_without_tables_is_a_failure() {
        let detector = FixedDetector(Vec::new());
        match extract(Path::new("blank.pdf"), &detector) {
            Err(ExtractError::NoTable(path)) => assert_eq!(path, PathBuf::from("blank.pdf")),
            other => panic!("expected NoTable, got {other:?}"),
        }
    }

    #[test]
    fn extract_passes_detector_errors_through() {
        let err = extract(Path::new("bad.pdf"), &FailingDetector).unwrap_err();
        assert!(matches!(err, ExtractError::Ocr(_)));
    }
}
