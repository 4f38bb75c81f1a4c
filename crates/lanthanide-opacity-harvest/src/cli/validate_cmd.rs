//! `opacity-harvest validate`: load and check the snapshot.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Result};
use lanthanide_opacity::{Grid, SnapshotReader};

use crate::config::SNAPSHOT_FILE;

/// Verify the snapshot in `data_dir` loads and its keys lie on the grid.
pub fn run(data_dir: &Path) -> Result<()> {
    let snapshot = data_dir.join(SNAPSHOT_FILE);
    if !snapshot.exists() {
        bail!("no snapshot at {}", snapshot.display());
    }

    let table = match SnapshotReader::read_from_file(&snapshot) {
        Ok(table) => table,
        Err(e) => bail!("invalid snapshot {}: {e}", snapshot.display()),
    };

    let grid_keys: HashSet<_> = Grid::default().points().map(|p| p.key()).collect();
    let keys = table.keys();
    let off_grid = keys.iter().filter(|k| !grid_keys.contains(k)).count();

    println!("Valid snapshot: {}", snapshot.display());
    println!("  Rows: {}", table.len());
    println!("  Columns: {}", table.columns().len());
    println!("  Grid points: {}", keys.len());
    if off_grid > 0 {
        println!("  Off-grid points: {off_grid}");
    }
    Ok(())
}
