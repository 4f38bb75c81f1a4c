//! `opacity-harvest status`: how far the harvest has got.

use std::path::Path;

use anyhow::{Context, Result};
use lanthanide_opacity::{
    AbandonedPoint, CompletionLedger, Grid, OpacityTable, SnapshotReader,
};
use serde::Serialize;

use crate::config::{LEDGER_FILE, SNAPSHOT_FILE};

/// Snapshot of harvest progress in a data directory.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub grid_points: usize,
    pub completed: usize,
    pub remaining: usize,
    pub rows: usize,
    pub columns: usize,
    pub abandoned: Vec<AbandonedPoint>,
}

/// Gather a report without touching the network or creating files.
pub fn collect(data_dir: &Path, grid: &Grid) -> Result<StatusReport> {
    let snapshot = data_dir.join(SNAPSHOT_FILE);
    let mut table = if snapshot.exists() {
        SnapshotReader::read_from_file(&snapshot)
            .with_context(|| format!("failed to read {}", snapshot.display()))?
    } else {
        OpacityTable::new()
    };
    table.sort_index();

    let ledger_path = data_dir.join(LEDGER_FILE);
    let ledger = if ledger_path.exists() {
        CompletionLedger::open(&ledger_path)?
    } else {
        CompletionLedger::open_in_memory()?
    };

    // Ledger entries without rows in the table are dropped on the next run.
    let completed = grid
        .points()
        .filter(|point| table.contains_key(&point.key()))
        .count();

    Ok(StatusReport {
        grid_points: grid.len(),
        completed,
        remaining: grid.len() - completed,
        rows: table.len(),
        columns: table.columns().len(),
        abandoned: ledger.abandoned()?,
    })
}

/// Print the report for `data_dir`, as text or JSON.
pub fn run(data_dir: &Path, json: bool) -> Result<()> {
    let report = collect(data_dir, &Grid::default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Opacity harvest status: {}", data_dir.display());
    println!("  Grid points: {}", report.grid_points);
    println!("  Completed:   {}", report.completed);
    println!("  Remaining:   {}", report.remaining);
    println!("  Rows:        {}", report.rows);
    println!("  Columns:     {}", report.columns);
    if !report.abandoned.is_empty() {
        println!("  Abandoned in last run: {}", report.abandoned.len());
        for point in &report.abandoned {
            println!(
                "    {} after {} attempts: {}",
                point.key, point.attempts, point.last_error
            );
        }
    }
    Ok(())
}
