// src/archive.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Base name of the archived snapshot, before the date suffix.
pub const SNAPSHOT_ARCHIVE_STEM: &str = "grazing_data";

/// `<dir>/<stem>_loaded_<date>.<ext>`, or `..._<date>_<n>.<ext>` with the
/// smallest `n >= 2` that is free. Never returns an existing path.
pub fn unique_destination(dir: &Path, stem: &str, ext: Option<&str>, run_date: NaiveDate) -> PathBuf {
    free_path(dir, &format!("{stem}_loaded_{}", run_date.format("%Y-%m-%d")), ext)
}

/// `<dir>/<base>.<ext>`, suffixed `_2`, `_3`, ... until the name is unused.
pub fn free_path(dir: &Path, base: &str, ext: Option<&str>) -> PathBuf {
    let name = |suffix: Option<u32>| {
        let mut n = match suffix {
            Some(i) => format!("{base}_{i}"),
            None => base.to_string(),
        };
        if let Some(ext) = ext {
            n.push('.');
            n.push_str(ext);
        }
        n
    };

    let first = dir.join(name(None));
    if !first.exists() {
        return first;
    }
    debug!(taken = %first.display(), "name taken, adding a suffix");
    (2..)
        .map(|i| dir.join(name(Some(i))))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Rename, falling back to copy + remove when the archive sits on another
/// filesystem. If the fallback fails too, the rename error is reported.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let Err(err) = fs::rename(from, to) else {
        return Ok(());
    };
    if !from.is_file() || to.exists() {
        return Err(err);
    }
    if fs::copy(from, to).is_err() {
        let _ = fs::remove_file(to);
        return Err(err);
    }
    fs::remove_file(from)
}

fn archive_one(file: &Path, loaded_dir: &Path, stem: &str, run_date: NaiveDate) -> Result<PathBuf> {
    let ext = file.extension().and_then(|e| e.to_str());
    let dest = unique_destination(loaded_dir, stem, ext, run_date);
    move_file(file, &dest)
        .with_context(|| format!("archiving {:?} -> {:?}", file, dest))?;
    Ok(dest)
}

/// Move every processed inbound file into `loaded_dir`, dated with the run
/// date. Returns the new paths in input order.
#[tracing::instrument(level = "info", skip(processed), fields(files = processed.len()))]
pub fn archive(processed: &[PathBuf], loaded_dir: &Path, run_date: NaiveDate) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(loaded_dir)
        .with_context(|| format!("creating archive directory {:?}", loaded_dir))?;

    let mut archived = Vec::with_capacity(processed.len());
    for file in processed {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let dest = archive_one(file, loaded_dir, &stem, run_date)?;
        info!(file = %file.display(), dest = %dest.display(), "File archived");
        archived.push(dest);
    }
    Ok(archived)
}

/// Move the run's snapshot to `grazing_data_loaded_<date>.parquet`.
pub fn archive_snapshot(snapshot: &Path, loaded_dir: &Path, run_date: NaiveDate) -> Result<PathBuf> {
    fs::create_dir_all(loaded_dir)
        .with_context(|| format!("creating archive directory {:?}", loaded_dir))?;
    let dest = archive_one(snapshot, loaded_dir, SNAPSHOT_ARCHIVE_STEM, run_date)?;
    info!(snapshot = %snapshot.display(), dest = %dest.display(), "Snapshot archived");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn files_move_out_of_inbound_with_the_run_date() -> Result<()> {
        let dir = tempdir()?;
        let inbound = dir.path().join("data_dump");
        let loaded = dir.path().join("loaded_data");
        fs::create_dir_all(&inbound)?;
        let a = inbound.join("a.pdf");
        let b = inbound.join("b.pdf");
        fs::write(&a, b"a")?;
        fs::write(&b, b"b")?;

        let moved = archive(&[a.clone(), b.clone()], &loaded, date())?;

        assert_eq!(
            moved,
            vec![
                loaded.join("a_loaded_2024-03-05.pdf"),
                loaded.join("b_loaded_2024-03-05.pdf")
            ]
        );
        assert!(!a.exists() && !b.exists());
        assert_eq!(fs::read(&moved[1])?, b"b");
        Ok(())
    }

    #[test]
    fn same_day_collisions_get_a_numeric_suffix() -> Result<()> {
        let dir = tempdir()?;
        let loaded = dir.path().join("loaded_data");
        for round in 0..3 {
            let f = dir.path().join("report.pdf");
            fs::write(&f, format!("round {round}"))?;
            archive(&[f], &loaded, date())?;
        }

        assert_eq!(fs::read_to_string(loaded.join("report_loaded_2024-03-05.pdf"))?, "round 0");
        assert_eq!(fs::read_to_string(loaded.join("report_loaded_2024-03-05_2.pdf"))?, "round 1");
        assert_eq!(fs::read_to_string(loaded.join("report_loaded_2024-03-05_3.pdf"))?, "round 2");
        Ok(())
    }

    #[test]
    fn snapshot_archive_name() -> Result<()> {
        let dir = tempdir()?;
        let snap = dir.path().join("grazing_data.parquet");
        fs::write(&snap, b"PAR1")?;
        let dest = archive_snapshot(&snap, &dir.path().join("loaded"), date())?;
        assert!(dest.ends_with("loaded/grazing_data_loaded_2024-03-05.parquet"));
        assert!(!snap.exists());
        Ok(())
    }
}
