use anyhow::{Context, Result};
use grazing_etl::dataset::read_snapshot;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{env, fs::File, path::Path, process::exit};

fn main() {
    // Expect exactly one CLI argument: path to a snapshot file.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <SNAPSHOT_PARQUET>", args[0]);
        exit(2);
    }
    if let Err(e) = inspect_snapshot(Path::new(&args[1])) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Print the file metadata, the column layout and every record.
fn inspect_snapshot(path: &Path) -> Result<()> {
    // 1) file-level metadata
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("reading parquet footer")?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();

    println!("=== Snapshot: {} ===", path.display());
    println!(
        "Created by:           {}",
        file_meta.created_by().unwrap_or("<unknown>")
    );
    println!("Total rows:           {}", file_meta.num_rows());
    println!("Number of row groups: {}", meta.num_row_groups());
    if let Some(rg) = (meta.num_row_groups() > 0).then(|| meta.row_group(0)) {
        if rg.num_columns() > 0 {
            println!("Compression:          {:?}", rg.column(0).compression());
        }
    }
    println!();

    // 2) columns
    println!("=== Columns ===");
    for col in file_meta.schema_descr().columns() {
        let logical = col
            .logical_type()
            .as_ref()
            .map_or("<none>".to_string(), |lt| format!("{:?}", lt));
        println!(
            "- {:<24} | Physical: {:<10} | Logical: {}",
            col.name(),
            format!("{:?}", col.physical_type()),
            logical
        );
    }
    println!();

    // 3) records
    let dataset = read_snapshot(path)?;
    println!("=== Records ({}) ===", dataset.len());
    for (i, record) in dataset.records().iter().enumerate() {
        println!(
            "{:>4}  {} | {} | {:<24} | {:>8} | {}",
            i,
            record.grazer,
            record.reporting_date,
            record.area,
            record.number_of_animal_units,
            record.comments.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
