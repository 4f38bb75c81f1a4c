//! `opacity-harvest export`: rewrite the CSV from the snapshot.

use std::path::Path;

use anyhow::{bail, Context, Result};
use lanthanide_opacity::{CsvExporter, SnapshotReader};

use crate::config::{EXPORT_FILE, SNAPSHOT_FILE};

/// Read the snapshot in `data_dir` and write the CSV next to it.
pub fn run(data_dir: &Path) -> Result<()> {
    let snapshot = data_dir.join(SNAPSHOT_FILE);
    if !snapshot.exists() {
        bail!("no snapshot at {}", snapshot.display());
    }

    let mut table = SnapshotReader::read_from_file(&snapshot)
        .with_context(|| format!("failed to read {}", snapshot.display()))?;
    table.sort_index();

    let export = data_dir.join(EXPORT_FILE);
    CsvExporter::write_to_file(&table, &export)
        .with_context(|| format!("failed to write {}", export.display()))?;

    println!("Exported {} rows to {}", table.len(), export.display());
    Ok(())
}
