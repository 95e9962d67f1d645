use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "grazing_etl",
    version,
    about = "Load scanned grazing reports into the warehouse"
)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, default_value = "yaml/etl_variables.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, normalize, load and archive everything in the inbound directory.
    Run(RunArgs),
    /// Load an existing snapshot without running OCR.
    LoadSnapshot(LoadSnapshotArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Stop after the snapshot is written.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LoadSnapshotArgs {
    /// Defaults to `transformed_parquet` from the config.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

impl Cli {
    /// A bare invocation means `run`.
    pub fn effective_command(&self) -> Commands {
        match &self.command {
            Some(Commands::Run(args)) => Commands::Run(args.clone()),
            Some(Commands::LoadSnapshot(args)) => Commands::LoadSnapshot(args.clone()),
            None => Commands::Run(RunArgs::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_runs_the_pipeline() {
        let cli = Cli::try_parse_from(["grazing_etl"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("yaml/etl_variables.yaml"));
        assert!(matches!(cli.effective_command(), Commands::Run(RunArgs { dry_run: false })));
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["grazing_etl", "run", "--dry-run", "--config", "x.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
        assert!(matches!(cli.effective_command(), Commands::Run(RunArgs { dry_run: true })));

        let cli = Cli::try_parse_from(["grazing_etl", "load-snapshot", "--snapshot", "s.parquet"]).unwrap();
        match cli.effective_command() {
            Commands::LoadSnapshot(args) => assert_eq!(args.snapshot, Some(PathBuf::from("s.parquet"))),
            other => panic!("unexpected {other:?}"),
        }
    }
}
