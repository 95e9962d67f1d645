// src/load/mod.rs

pub mod duck;
pub mod pg;
pub mod sql;

use serde::Serialize;
use tracing::{error, info};

use crate::{
    config::{Backend, Credentials, WarehouseConfig},
    dataset::UnifiedDataset,
    error::{BackendError, LoadError},
    transform::{CanonicalColumn, FieldValue},
};

pub use duck::DuckWarehouse;
pub use pg::PostgresWarehouse;

/// One open warehouse session. Statements autocommit individually.
pub trait Warehouse {
    /// How this backend spells the n-th (1-based) bind parameter.
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }
    /// Run a read-only query and discard its rows.
    fn probe(&mut self, sql: &str) -> Result<(), BackendError>;
    /// Run a write statement with `params` bound in order, returning the
    /// number of rows it touched.
    fn execute(&mut self, sql: &str, params: &[FieldValue<'_>]) -> Result<u64, BackendError>;
}

/// Where rows go and how conflicts are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TableTarget {
    pub schema: String,
    pub table: String,
    pub prim_key: Vec<CanonicalColumn>,
    pub update_column: CanonicalColumn,
    pub edited_on_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub rows_attempted: usize,
    pub rows_upserted: u64,
}

/// Open a session for the configured backend. `credentials` is only
/// consulted for Postgres, and only once a connection is actually wanted.
pub fn connect<F>(config: &WarehouseConfig, credentials: F) -> Result<Box<dyn Warehouse>, LoadError>
where
    F: FnOnce() -> Result<Credentials, LoadError>,
{
    let result = open(config, credentials);
    match &result {
        Ok(_) => info!(database = %config.db_name, backend = ?config.backend, "Connected to warehouse"),
        Err(err) => error!(error = ?err, "Warehouse connection failed: {}", err),
    }
    result
}

fn open<F>(config: &WarehouseConfig, credentials: F) -> Result<Box<dyn Warehouse>, LoadError>
where
    F: FnOnce() -> Result<Credentials, LoadError>,
{
    let connection_failed = |source: BackendError| LoadError::Connection {
        database: config.db_name.clone(),
        source,
    };
    match config.backend {
        Backend::Postgres => {
            let credentials = credentials()?;
            let warehouse = PostgresWarehouse::connect(config, &credentials).map_err(connection_failed)?;
            Ok(Box::new(warehouse))
        }
        Backend::Duckdb => {
            let warehouse = DuckWarehouse::open(&config.duckdb_path()).map_err(connection_failed)?;
            Ok(Box::new(warehouse))
        }
    }
}

/// Confirm the destination table exists before anything is written.
pub fn verify(warehouse: &mut dyn Warehouse, target: &TableTarget) -> Result<(), LoadError> {
    let table = target
        .qualified_name()
        .map_err(|e| LoadError::Verification {
            table: format!("{}.{}", target.schema, target.table),
            source: Box::new(e),
        })?;
    let probe = target.probe_sql().map_err(|e| LoadError::Verification {
        table: table.clone(),
        source: Box::new(e),
    })?;

    match warehouse.probe(&probe) {
        Ok(()) => {
            info!(table = %table, "Destination table verified");
            Ok(())
        }
        Err(source) => {
            error!(table = %table, error = %source, "Destination table verification failed");
            Err(LoadError::Verification { table, source })
        }
    }
}

/// Verify the target, then upsert every record, one statement per row.
/// The first failing row stops the load; rows before it stay committed.
#[tracing::instrument(level = "info", skip_all, fields(rows = dataset.len(), table = %target.table))]
pub fn load(
    dataset: &UnifiedDataset,
    target: &TableTarget,
    warehouse: &mut dyn Warehouse,
) -> Result<LoadReport, LoadError> {
    verify(warehouse, target)?;
    let table = format!("{}.{}", target.schema, target.table);
    let statement = target
        .upsert_sql(dataset.columns(), |n| warehouse.placeholder(n))
        .map_err(LoadError::Statement)?;

    let mut upserted = 0u64;
    let mut params = Vec::with_capacity(dataset.columns().len());
    for (row, record) in dataset.records().iter().enumerate() {
        params.clear();
        for column in dataset.columns() {
            let value = record.get(*column);
            sql::check_value(&value).map_err(|source| LoadError::RowValue { row, source })?;
            params.push(value);
        }
        match warehouse.execute(&statement, &params) {
            Ok(n) => upserted += n,
            Err(source) => {
                error!(row, committed = upserted, error = %source, "Row upsert failed; aborting load");
                return Err(LoadError::RowUpsert {
                    table,
                    row,
                    committed: upserted,
                    source,
                });
            }
        }
    }

    info!(rows = upserted, "Rows upserted into {}", table);
    Ok(LoadReport {
        table,
        rows_attempted: dataset.len(),
        rows_upserted: upserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::CanonicalRecord;
    use chrono::NaiveDate;

    /// Records statements and their bound values; optionally fails probes
    /// or the n-th write.
    #[derive(Default)]
    struct ScriptedWarehouse {
        fail_probe: bool,
        fail_on_write: Option<usize>,
        probes: Vec<String>,
        writes: Vec<(String, Vec<String>)>,
    }

    impl Warehouse for ScriptedWarehouse {
        fn probe(&mut self, sql: &str) -> Result<(), BackendError> {
            self.probes.push(sql.to_string());
            if self.fail_probe {
                return Err("relation does not exist".into());
            }
            Ok(())
        }

        fn execute(&mut self, sql: &str, params: &[FieldValue<'_>]) -> Result<u64, BackendError> {
            if self.fail_on_write == Some(self.writes.len()) {
                return Err("check constraint violated".into());
            }
            let params = params.iter().map(|p| format!("{p:?}")).collect();
            self.writes.push((sql.to_string(), params));
            Ok(1)
        }
    }

    fn target() -> TableTarget {
        TableTarget {
            schema: "grazing".into(),
            table: "grazing_reports".into(),
            prim_key: vec![CanonicalColumn::Grazer, CanonicalColumn::Area],
            update_column: CanonicalColumn::NumberOfAnimalUnits,
            edited_on_column: "edited_on".into(),
        }
    }

    fn dataset(n: usize) -> UnifiedDataset {
        let records = (0..n)
            .map(|i| CanonicalRecord {
                area: format!("Area {i}"),
                number_of_animal_units: i as f64,
                comments: None,
                grazer: "Smith".into(),
                reporting_date: NaiveDate::from_ymd_opt(2023, 6, 12).unwrap(),
            })
            .collect();
        UnifiedDataset::new(
            vec![
                CanonicalColumn::Grazer,
                CanonicalColumn::ReportingDate,
                CanonicalColumn::Area,
                CanonicalColumn::NumberOfAnimalUnits,
            ],
            records,
        )
    }

    #[test]
    fn load_probes_then_writes_every_row() {
        let mut wh = ScriptedWarehouse::default();
        let report = load(&dataset(3), &target(), &mut wh).unwrap();
        assert_eq!(wh.probes.len(), 1);
        assert_eq!(wh.writes.len(), 3);
        let (sql, params) = &wh.writes[2];
        assert!(sql.contains("VALUES ($1::text, $2::date, $3::text, $4::float8)"));
        assert!(!sql.contains("Area 2"));
        assert_eq!(params[0], "Text(\"Smith\")");
        assert_eq!(params[2], "Text(\"Area 2\")");
        assert_eq!(params[3], "Number(2.0)");
        // one statement text for every row
        assert!(wh.writes.iter().all(|(s, _)| s == sql));
        assert_eq!(
            report,
            LoadReport {
                table: "grazing.grazing_reports".into(),
                rows_attempted: 3,
                rows_upserted: 3,
            }
        );
    }

    #[test]
    fn failed_probe_blocks_all_writes() {
        let mut wh = ScriptedWarehouse {
            fail_probe: true,
            ..Default::default()
        };
        let err = load(&dataset(2), &target(), &mut wh).unwrap_err();
        assert!(matches!(err, LoadError::Verification { .. }));
        assert!(wh.writes.is_empty());
    }

    #[test]
    fn first_failing_row_aborts_the_rest() {
        let mut wh = ScriptedWarehouse {
            fail_on_write: Some(1),
            ..Default::default()
        };
        match load(&dataset(4), &target(), &mut wh) {
            Err(LoadError::RowUpsert { row, committed, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(committed, 1);
            }
            other => panic!("expected RowUpsert, got {other:?}"),
        }
        assert_eq!(wh.writes.len(), 1);
    }

    #[test]
    fn unbindable_value_stops_before_the_write() {
        let mut data = dataset(3);
        let mut records = data.records().to_vec();
        records[1].number_of_animal_units = f64::INFINITY;
        data = UnifiedDataset::new(data.columns().to_vec(), records);

        let mut wh = ScriptedWarehouse::default();
        match load(&data, &target(), &mut wh) {
            Err(LoadError::RowValue { row, .. }) => assert_eq!(row, 1),
            other => panic!("expected RowValue, got {other:?}"),
        }
        assert_eq!(wh.writes.len(), 1);
    }

    #[test]
    fn postgres_without_credentials_is_refused_and_logged() {
        crate::logging::init_test_logging();
        let config = crate::config::EtlConfig::from_yaml_str(crate::config::tests::SAMPLE).unwrap();
        let err = connect(&config.warehouse, || Credentials::from_lookup(|_| None))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            LoadError::MissingCredentials(Credentials::USER_VAR)
        ));
    }

    #[test]
    fn duckdb_never_asks_for_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "{}\n  backend: duckdb\n  duckdb_path: {}\n",
            crate::config::tests::SAMPLE.trim_end(),
            dir.path().join("wh.duckdb").display()
        );
        let config = crate::config::EtlConfig::from_yaml_str(&yaml).unwrap();
        let wh = connect(&config.warehouse, || panic!("credentials read for duckdb"));
        assert!(wh.is_ok());
    }
}
