// src/dataset/snapshot.rs

use anyhow::{Context, Result};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use tracing::info;

use super::{batch, UnifiedDataset};

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".into());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write the dataset to `path` as one SNAPPY Parquet row group.
/// The file is filled under a temporary name and renamed into place, so a
/// crash never leaves a truncated snapshot behind.
#[tracing::instrument(level = "info", skip(dataset), fields(records = dataset.len()))]
pub fn write_snapshot(dataset: &UnifiedDataset, path: &Path) -> Result<()> {
    // 1) make sure the directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating snapshot directory {:?}", parent))?;
    }

    // 2) write to the tmp sibling
    let batch = batch::to_record_batch(dataset)?;
    let tmp = tmp_path(path);
    let file = File::create(&tmp).with_context(|| format!("creating {:?}", tmp))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer for snapshot")?;
    writer.write(&batch).context("writing snapshot batch")?;
    writer.close().context("closing snapshot writer")?;

    // 3) rename over the previous snapshot
    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} -> {:?}", tmp, path))?;

    info!(path = %path.display(), "Snapshot written");
    Ok(())
}

/// Read a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<UnifiedDataset> {
    let file = File::open(path).with_context(|| format!("opening snapshot {:?}", path))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {:?}", path))?
        .build()
        .context("building snapshot reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("decoding {:?}", path))?;

    let dataset = batch::from_record_batches(&batches)
        .with_context(|| format!("rebuilding records from {:?}", path))?;
    info!(path = %path.display(), records = dataset.len(), "Snapshot read");
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{CanonicalColumn, CanonicalRecord};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn dataset(units: f64) -> UnifiedDataset {
        UnifiedDataset::new(
            vec![
                CanonicalColumn::Area,
                CanonicalColumn::NumberOfAnimalUnits,
                CanonicalColumn::Comments,
                CanonicalColumn::Grazer,
                CanonicalColumn::ReportingDate,
            ],
            vec![CanonicalRecord {
                area: "North".into(),
                number_of_animal_units: units,
                comments: None,
                grazer: "Smith".into(),
                reporting_date: NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(),
            }],
        )
    }

    #[test]
    fn snapshot_is_overwritten_in_place() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("staging/grazing_data.parquet");

        write_snapshot(&dataset(1.0), &path)?;
        write_snapshot(&dataset(2.0), &path)?;

        assert_eq!(read_snapshot(&path)?, dataset(2.0));
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, ["grazing_data.parquet"]);
        Ok(())
    }

    #[test]
    fn missing_snapshot_names_the_path() {
        let err = read_snapshot(Path::new("/nonexistent/grazing_data.parquet")).unwrap_err();
        assert!(format!("{err:#}").contains("grazing_data.parquet"));
    }
}
