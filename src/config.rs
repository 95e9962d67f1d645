// src/config.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    error::LoadError,
    load::{self, TableTarget, Warehouse},
    transform::{AreaAliases, CanonicalColumn},
};

/// Everything a run needs from `yaml/etl_variables.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EtlConfig {
    #[serde(default = "default_inbound_dir")]
    pub inbound_dir: PathBuf,
    #[serde(default = "default_inbound_pattern")]
    pub inbound_pattern: String,
    #[serde(default = "default_loaded_dir")]
    pub loaded_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Where the unified dataset is snapshotted between transform and load.
    pub transformed_parquet: PathBuf,
    pub columns_in_order: Vec<CanonicalColumn>,
    #[serde(default)]
    pub areas_to_replace: AreaAliases,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Duckdb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub backend: Backend,
    pub db_name: String,
    pub schema: String,
    pub table: String,
    pub prim_key: Vec<CanonicalColumn>,
    #[serde(default = "default_update_column")]
    pub update_column: CanonicalColumn,
    #[serde(default = "default_edited_on_column")]
    pub edited_on_column: String,
    #[serde(default)]
    pub duckdb_path: Option<PathBuf>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_lang")]
    pub lang: String,
    #[serde(default = "default_ocr_psm")]
    pub psm: u32,
    #[serde(default = "default_ocr_dpi")]
    pub dpi: u32,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            lang: default_ocr_lang(),
            psm: default_ocr_psm(),
            dpi: default_ocr_dpi(),
            timeout_secs: default_ocr_timeout(),
        }
    }
}

fn default_inbound_dir() -> PathBuf {
    PathBuf::from("data_dump")
}
fn default_inbound_pattern() -> String {
    "*.pdf".into()
}
fn default_loaded_dir() -> PathBuf {
    PathBuf::from("loaded_data")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}
fn default_update_column() -> CanonicalColumn {
    CanonicalColumn::NumberOfAnimalUnits
}
fn default_edited_on_column() -> String {
    "edited_on".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_statement_timeout() -> u64 {
    30
}
fn default_ocr_lang() -> String {
    "eng".into()
}
fn default_ocr_psm() -> u32 {
    6
}
fn default_ocr_dpi() -> u32 {
    300
}
fn default_ocr_timeout() -> u64 {
    120
}

impl EtlConfig {
    /// Read, parse and validate the YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: EtlConfig = serde_yaml::from_str(text).context("parsing YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns_in_order {
            if !seen.insert(*column) {
                bail!("columns_in_order lists {column} twice");
            }
        }
        for required in [
            CanonicalColumn::Area,
            CanonicalColumn::NumberOfAnimalUnits,
            CanonicalColumn::Grazer,
            CanonicalColumn::ReportingDate,
        ] {
            if !seen.contains(&required) {
                bail!("columns_in_order must include {required}");
            }
        }

        let wh = &self.warehouse;
        if wh.prim_key.is_empty() {
            bail!("warehouse.prim_key must name at least one column");
        }
        let mut key_seen = HashSet::new();
        for key in &wh.prim_key {
            if !key_seen.insert(*key) {
                bail!("warehouse.prim_key lists {key} twice");
            }
            if !seen.contains(key) {
                bail!("primary key column {key} is not in columns_in_order");
            }
        }
        if !seen.contains(&wh.update_column) {
            bail!("update column {} is not in columns_in_order", wh.update_column);
        }
        if key_seen.contains(&wh.update_column) {
            bail!("update column {} is part of the primary key", wh.update_column);
        }
        for (field, value) in [
            ("db_name", &wh.db_name),
            ("schema", &wh.schema),
            ("table", &wh.table),
            ("edited_on_column", &wh.edited_on_column),
        ] {
            if value.trim().is_empty() {
                bail!("warehouse.{field} must not be empty");
            }
        }
        if CanonicalColumn::from_name(&wh.edited_on_column).is_some() {
            bail!(
                "warehouse.edited_on_column {:?} collides with a data column",
                wh.edited_on_column
            );
        }
        if wh.connect_timeout_secs == 0 || wh.statement_timeout_secs == 0 {
            bail!("warehouse timeouts must be positive");
        }

        if let Some((key, target, next)) = self.areas_to_replace.find_chain() {
            bail!("areas_to_replace chains {key:?} → {target:?} → {next:?}; map {key:?} straight to its final name");
        }

        if self.transformed_parquet.starts_with(&self.inbound_dir) {
            bail!(
                "snapshot {} must live outside the inbound directory {}",
                self.transformed_parquet.display(),
                self.inbound_dir.display()
            );
        }

        if self.ocr.timeout_secs == 0 || self.ocr.dpi == 0 {
            bail!("ocr.timeout_secs and ocr.dpi must be positive");
        }
        Ok(())
    }
}

impl WarehouseConfig {
    /// `db.schema.table`, as it appears in log lines.
    pub fn fully_qualified(&self) -> String {
        format!("{}.{}.{}", self.db_name, self.schema, self.table)
    }

    pub fn target(&self) -> TableTarget {
        TableTarget {
            schema: self.schema.clone(),
            table: self.table.clone(),
            prim_key: self.prim_key.clone(),
            update_column: self.update_column,
            edited_on_column: self.edited_on_column.clone(),
        }
    }

    pub fn duckdb_path(&self) -> PathBuf {
        self.duckdb_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.duckdb", self.db_name)))
    }
}

/// Warehouse login, taken from the process environment only.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub host: String,
    pub password: String,
}

impl Credentials {
    pub const USER_VAR: &'static str = "kwb_dw_user";
    pub const HOST_VAR: &'static str = "kwb_dw_host";
    pub const PASSWORD_VAR: &'static str = "kwb_dw_password";

    pub fn from_env() -> Result<Self, LoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoadError> {
        let get = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(LoadError::MissingCredentials(name))
        };
        Ok(Self {
            user: get(Self::USER_VAR)?,
            host: get(Self::HOST_VAR)?,
            password: get(Self::PASSWORD_VAR)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Built once at process start and handed to every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: EtlConfig,
    pub run_date: NaiveDate,
}

impl RunContext {
    pub fn new(config: EtlConfig, run_date: NaiveDate) -> Self {
        Self { config, run_date }
    }

    /// Open the configured warehouse. Credentials come from the process
    /// environment at this point, never earlier.
    pub fn connect(&self) -> Result<Box<dyn Warehouse>, LoadError> {
        load::connect(&self.config.warehouse, Credentials::from_env)
    }
}
