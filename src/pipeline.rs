// src/pipeline.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use glob::{glob_with, MatchOptions, Pattern};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::{
    archive,
    config::{EtlConfig, RunContext},
    dataset::{self, UnifiedDataset},
    error::LoadError,
    extract::{self, TableDetector},
    load::{self, LoadReport, Warehouse},
    transform::{self, RecordSet},
};

pub const NO_DATA_MESSAGE: &str = "No data is available for loading, quitting program.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Normalize,
}

/// An inbound file that was left out of the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub file: PathBuf,
    pub stage: Stage,
    pub error: String,
}

/// Written next to the archives once a load has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub table: String,
    pub files_loaded: Vec<PathBuf>,
    pub files_failed: Vec<FileFailure>,
    /// Normalized cleanly but every row was dropped; left in the inbound directory.
    pub files_skipped: Vec<PathBuf>,
    pub records: usize,
    pub rows_upserted: u64,
    pub snapshot_archive: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing in the inbound directory.
    NoData,
    /// Snapshot written, load and archive skipped.
    DryRun {
        records: usize,
        failures: Vec<FileFailure>,
    },
    Loaded(RunSummary),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

/// Inbound files matching `pattern` (case-insensitively), sorted by path.
/// Directories are skipped. A missing inbound directory counts as empty.
pub fn enumerate_inbound(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Inbound directory does not exist");
        return Ok(Vec::new());
    }
    let full = format!(
        "{}/{}",
        Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let mut files = Vec::new();
    for entry in glob_with(&full, options).with_context(|| format!("bad inbound pattern {:?}", full))? {
        let path = entry.context("reading inbound directory entry")?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("listing inbound directory {:?}", dir))?
            .count();
        if entries > 0 {
            warn!(
                dir = %dir.display(),
                pattern,
                entries,
                "Inbound directory has entries but none match the pattern"
            );
        }
    }
    Ok(files)
}

/// Per-file extract + normalize. Failures are collected, never raised.
/// Only files that contributed at least one record count as processed.
struct Transformed {
    record_sets: Vec<RecordSet>,
    processed: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
    failures: Vec<FileFailure>,
}

fn transform_files(files: &[PathBuf], detector: &dyn TableDetector, config: &EtlConfig) -> Transformed {
    let mut out = Transformed {
        record_sets: Vec::new(),
        processed: Vec::new(),
        skipped: Vec::new(),
        failures: Vec::new(),
    };

    for file in files {
        let table = match extract::extract(file, detector) {
            Ok(table) => table,
            Err(err) => {
                warn!(file = %file.display(), "Skipping file: extraction failed");
                out.failures.push(FileFailure {
                    file: file.clone(),
                    stage: Stage::Extract,
                    error: err.to_string(),
                });
                continue;
            }
        };

        match transform::normalize(&table, &config.areas_to_replace) {
            Ok(set) => {
                if set.records.is_empty() {
                    warn!(
                        file = %file.display(),
                        dropped = set.dropped,
                        "No usable rows; file left in the inbound directory"
                    );
                    out.skipped.push(file.clone());
                } else {
                    out.processed.push(file.clone());
                }
                out.record_sets.push(set);
            }
            Err(err) => {
                warn!(file = %file.display(), "Skipping file: normalization failed");
                out.failures.push(FileFailure {
                    file: file.clone(),
                    stage: Stage::Normalize,
                    error: err.to_string(),
                });
            }
        }
    }
    out
}

/// Write `summary` as pretty JSON to `loaded_dir/run_<date>.json` (suffixed
/// on collision), via a tmp file and rename.
pub fn write_summary(summary: &RunSummary, loaded_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(loaded_dir)
        .with_context(|| format!("creating archive directory {:?}", loaded_dir))?;
    let base = format!("run_{}", summary.run_date.format("%Y-%m-%d"));
    let path = archive::free_path(loaded_dir, &base, Some("json"));

    let tmp_path = loaded_dir.join(format!(".{base}.json.tmp"));
    let mut tmp = fs::File::create(&tmp_path)
        .with_context(|| format!("creating {:?}", tmp_path))?;
    serde_json::to_writer_pretty(&mut tmp, summary).context("serializing run summary")?;
    tmp.write_all(b"\n")?;
    fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;

    info!(path = %path.display(), "Run summary written");
    Ok(path)
}

fn connect_and_load<C>(ctx: &RunContext, dataset: &UnifiedDataset, connect: C) -> Result<LoadReport, LoadError>
where
    C: FnOnce() -> Result<Box<dyn Warehouse>, LoadError>,
{
    let mut warehouse = connect()?;
    let report = load::load(dataset, &ctx.config.warehouse.target(), warehouse.as_mut())?;
    info!(
        rows = report.rows_upserted,
        "Data successfully loaded into {}",
        ctx.config.warehouse.fully_qualified()
    );
    Ok(report)
}

/// The whole run: enumerate → extract/normalize → aggregate → snapshot →
/// load → archive. `connect` is only called once there is data to load.
#[tracing::instrument(level = "info", skip_all, fields(run_date = %ctx.run_date))]
pub fn run<C>(
    ctx: &RunContext,
    detector: &dyn TableDetector,
    connect: C,
    options: RunOptions,
) -> Result<RunOutcome>
where
    C: FnOnce() -> Result<Box<dyn Warehouse>, LoadError>,
{
    let config = &ctx.config;

    // ─── 1) inbound queue ─────────────────────────────────────────────
    let files = enumerate_inbound(&config.inbound_dir, &config.inbound_pattern)?;
    if files.is_empty() {
        info!("{}", NO_DATA_MESSAGE);
        return Ok(RunOutcome::NoData);
    }
    info!(files = files.len(), "Inbound files found");

    // ─── 2) extract + normalize each file ─────────────────────────────
    let Transformed {
        record_sets,
        processed,
        skipped,
        failures,
    } = transform_files(&files, detector, config);

    // ─── 3) aggregate + snapshot ──────────────────────────────────────
    let dataset = dataset::aggregate(&config.columns_in_order, record_sets, failures.len())?;
    dataset::write_snapshot(&dataset, &config.transformed_parquet)?;

    if options.dry_run {
        info!(records = dataset.len(), "Dry run: skipping load and archive");
        return Ok(RunOutcome::DryRun {
            records: dataset.len(),
            failures,
        });
    }

    // ─── 4) load ──────────────────────────────────────────────────────
    let report = connect_and_load(ctx, &dataset, connect)?;

    // ─── 5) archive inputs, snapshot, summary ─────────────────────────
    archive::archive(&processed, &config.loaded_dir, ctx.run_date)?;
    let snapshot_archive =
        archive::archive_snapshot(&config.transformed_parquet, &config.loaded_dir, ctx.run_date)?;

    let summary = RunSummary {
        run_date: ctx.run_date,
        table: config.warehouse.fully_qualified(),
        files_loaded: processed,
        files_failed: failures,
        files_skipped: skipped,
        records: dataset.len(),
        rows_upserted: report.rows_upserted,
        snapshot_archive,
    };
    write_summary(&summary, &config.loaded_dir)?;
    Ok(RunOutcome::Loaded(summary))
}

/// Recovery: load an existing snapshot (by default the configured one)
/// without touching the inbound queue, then archive it.
#[tracing::instrument(level = "info", skip_all, fields(run_date = %ctx.run_date))]
pub fn load_snapshot<C>(ctx: &RunContext, snapshot: Option<&Path>, connect: C) -> Result<RunSummary>
where
    C: FnOnce() -> Result<Box<dyn Warehouse>, LoadError>,
{
    let config = &ctx.config;
    let path = snapshot.unwrap_or(config.transformed_parquet.as_path());
    let dataset = dataset::read_snapshot(path)?;
    if dataset.is_empty() {
        bail!("snapshot {} holds no records", path.display());
    }

    let report = connect_and_load(ctx, &dataset, connect)?;
    let snapshot_archive = archive::archive_snapshot(path, &config.loaded_dir, ctx.run_date)?;

    let summary = RunSummary {
        run_date: ctx.run_date,
        table: config.warehouse.fully_qualified(),
        files_loaded: Vec::new(),
        files_failed: Vec::new(),
        files_skipped: Vec::new(),
        records: dataset.len(),
        rows_upserted: report.rows_upserted,
        snapshot_archive,
    };
    write_summary(&summary, &config.loaded_dir)?;
    Ok(summary)
}
