use anyhow::Result;
use chrono::Local;
use clap::Parser;
use grazing_etl::{
    cli::{Cli, Commands},
    config::{EtlConfig, RunContext},
    extract::TesseractDetector,
    logging,
    pipeline::{self, RunOptions, RunOutcome},
};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    // ─── 1) args + config (usage errors exit 2 inside clap) ──────────
    let cli = Cli::parse();
    let config = match EtlConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    // ─── 2) init logging ─────────────────────────────────────────────
    let _guard = match logging::init(&config.log_dir) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    let started = Local::now();
    info!(
        "--------------- Grazing ETL ran on {} ----------------",
        started.format("%Y-%m-%d %H:%M")
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let code = match execute(&cli, config, started.date_naive()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Run failed: {err:#}");
            ExitCode::FAILURE
        }
    };
    info!(
        "--------------- Grazing ETL finished at {} ----------------",
        Local::now().format("%Y-%m-%d %H:%M")
    );
    code
}

fn execute(cli: &Cli, config: EtlConfig, run_date: chrono::NaiveDate) -> Result<()> {
    let ctx = RunContext::new(config, run_date);
    let connect = || ctx.connect();

    match cli.effective_command() {
        Commands::Run(args) => {
            let detector = TesseractDetector::new(&ctx.config.ocr);
            let options = RunOptions {
                dry_run: args.dry_run,
            };
            match pipeline::run(&ctx, &detector, connect, options)? {
                RunOutcome::NoData => {}
                RunOutcome::DryRun { records, failures } => info!(
                    records,
                    failed_files = failures.len(),
                    "Dry run complete; snapshot at {}",
                    ctx.config.transformed_parquet.display()
                ),
                RunOutcome::Loaded(summary) => info!(
                    files = summary.files_loaded.len(),
                    failed_files = summary.files_failed.len(),
                    skipped_files = summary.files_skipped.len(),
                    rows = summary.rows_upserted,
                    "Run complete"
                ),
            }
        }
        Commands::LoadSnapshot(args) => {
            let summary = pipeline::load_snapshot(&ctx, args.snapshot.as_deref(), connect)?;
            info!(rows = summary.rows_upserted, "Snapshot load complete");
        }
    }
    Ok(())
}
