// src/dataset/batch.rs

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Array, Float64Array, StringArray},
    datatypes::{DataType, Date32Type, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::UnifiedDataset;
use crate::transform::{CanonicalColumn, CanonicalRecord};

/// Arrow type of each canonical column.
///
/// - area, grazer, comments → Utf8
/// - number_of_animal_units → Float64
/// - reporting_date         → Date32
pub fn arrow_type(column: CanonicalColumn) -> DataType {
    match column {
        CanonicalColumn::Area | CanonicalColumn::Comments | CanonicalColumn::Grazer => {
            DataType::Utf8
        }
        CanonicalColumn::NumberOfAnimalUnits => DataType::Float64,
        CanonicalColumn::ReportingDate => DataType::Date32,
    }
}

/// Schema in the given column order; only `comments` is nullable.
pub fn build_arrow_schema(columns: &[CanonicalColumn]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(c.name(), arrow_type(*c), c.nullable()))
        .collect();
    Arc::new(Schema::new(fields))
}

fn column_array(column: CanonicalColumn, records: &[CanonicalRecord]) -> ArrayRef {
    match column {
        CanonicalColumn::Area => Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.area.as_str()),
        )),
        CanonicalColumn::Grazer => Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.grazer.as_str()),
        )),
        CanonicalColumn::Comments => Arc::new(StringArray::from_iter(
            records.iter().map(|r| r.comments.as_deref()),
        )),
        CanonicalColumn::NumberOfAnimalUnits => Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.number_of_animal_units),
        )),
        CanonicalColumn::ReportingDate => Arc::new(Date32Array::from_iter_values(
            records
                .iter()
                .map(|r| Date32Type::from_naive_date(r.reporting_date)),
        )),
    }
}

/// One batch holding the whole dataset, columns in configured order.
pub fn to_record_batch(dataset: &UnifiedDataset) -> Result<RecordBatch> {
    let schema = build_arrow_schema(dataset.columns());
    let arrays: Vec<ArrayRef> = dataset
        .columns()
        .iter()
        .map(|c| column_array(*c, dataset.records()))
        .collect();
    RecordBatch::try_new(schema, arrays).context("building dataset record batch")
}

fn typed<'a, T: 'static>(batch: &'a RecordBatch, column: CanonicalColumn) -> Result<&'a T> {
    batch
        .column_by_name(column.name())
        .ok_or_else(|| anyhow!("snapshot has no `{}` column", column))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| {
            anyhow!(
                "snapshot column `{}` is not {:?}",
                column,
                arrow_type(column)
            )
        })
}

/// Rebuild records from snapshot batches. Every column except `comments` must
/// be present and non-null; the column order comes from the first batch.
pub fn from_record_batches(batches: &[RecordBatch]) -> Result<UnifiedDataset> {
    let mut columns = Vec::new();
    if let Some(first) = batches.first() {
        for field in first.schema().fields() {
            let column = CanonicalColumn::from_name(field.name())
                .ok_or_else(|| anyhow!("snapshot has unknown column `{}`", field.name()))?;
            columns.push(column);
        }
    }

    let mut records = Vec::new();
    for batch in batches {
        let area = typed::<StringArray>(batch, CanonicalColumn::Area)?;
        let units = typed::<Float64Array>(batch, CanonicalColumn::NumberOfAnimalUnits)?;
        let grazer = typed::<StringArray>(batch, CanonicalColumn::Grazer)?;
        let date = typed::<Date32Array>(batch, CanonicalColumn::ReportingDate)?;
        let comments = if columns.contains(&CanonicalColumn::Comments) {
            Some(typed::<StringArray>(batch, CanonicalColumn::Comments)?)
        } else {
            None
        };

        for row in 0..batch.num_rows() {
            if area.is_null(row) || units.is_null(row) || grazer.is_null(row) || date.is_null(row)
            {
                bail!("snapshot row {} has a null required value", records.len());
            }
            let reporting_date = date
                .value_as_date(row)
                .ok_or_else(|| anyhow!("snapshot row {} has an invalid date", records.len()))?;
            records.push(CanonicalRecord {
                area: area.value(row).to_string(),
                number_of_animal_units: units.value(row),
                comments: comments
                    .filter(|c| !c.is_null(row))
                    .map(|c| c.value(row).to_string()),
                grazer: grazer.value(row).to_string(),
                reporting_date,
            });
        }
    }

    Ok(UnifiedDataset::new(columns, records))
}
