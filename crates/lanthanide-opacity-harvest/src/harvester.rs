//! The acquisition loop: walk the grid, skip finished points, fetch, merge,
//! persist after every success, export at the end.

use lanthanide_opacity::{
    CompletionLedger, CompositeKey, CsvExporter, GridPoint, OpacityTable, SnapshotReader,
    SnapshotWriter,
};
use serde::{Deserialize, Serialize};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::parse::parse_opacity_table;
use crate::progress::ProgressTracker;
use crate::source::TableSource;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Grid points in the run.
    pub total: usize,
    /// Points already complete before the run reached them.
    pub skipped: usize,
    /// Points fetched and saved during this run.
    pub fetched: usize,
    /// Points given up on during this run.
    pub abandoned: usize,
    /// Points whose table had headers but no data rows.
    pub empty: usize,
    /// Rows merged during this run.
    pub rows_added: usize,
    /// Network requests issued.
    pub requests: usize,
}

/// What happened to one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointOutcome {
    /// Rows were merged and persisted.
    Saved { rows: usize, attempts: u32 },
    /// Every allowed attempt failed, or the failure was permanent.
    Abandoned { attempts: u32 },
    /// The table had no data rows; recorded as abandoned for a later run.
    Empty { attempts: u32 },
}

/// Owns the table, the ledger and the source for one harvest.
pub struct Harvester<S: TableSource> {
    config: HarvestConfig,
    source: S,
    table: OpacityTable,
    ledger: CompletionLedger,
}

impl<S: TableSource> Harvester<S> {
    /// Load the snapshot and ledger from the data directory.
    ///
    /// A missing snapshot starts an empty table; an unreadable one is an
    /// error. The ledger is then made to agree with the table: keys in the
    /// table are recorded complete, completed keys missing from it are
    /// forgotten so they get fetched again.
    pub fn open(config: HarvestConfig, source: S) -> HarvestResult<Self> {
        std::fs::create_dir_all(config.data_dir())?;

        let snapshot = config.snapshot_path();
        let mut table = if snapshot.exists() {
            tracing::info!("Loading snapshot: {}", snapshot.display());
            SnapshotReader::read_from_file(&snapshot)?
        } else {
            tracing::info!("No snapshot at {}, starting empty", snapshot.display());
            OpacityTable::new()
        };
        table.sort_index();

        let mut ledger = CompletionLedger::open(&config.ledger_path())?;
        let reconciled = ledger.reconcile(table.key_counts())?;
        if reconciled > 0 {
            tracing::info!("Ledger: recorded {reconciled} grid points found in the snapshot");
        }
        let forgotten = ledger.forget_missing(|key| table.contains_key(key))?;
        if forgotten > 0 {
            tracing::warn!(
                "Ledger: {forgotten} completed grid points are missing from the snapshot \
                 and will be fetched again"
            );
        }

        tracing::info!(
            "Table has {} rows over {} columns; ledger has {} completed grid points",
            table.len(),
            table.columns().len(),
            ledger.completed_count()?
        );

        Ok(Self {
            config,
            source,
            table,
            ledger,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn table(&self) -> &OpacityTable {
        &self.table
    }

    pub fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    /// Whether `key` needs no fetching: present in the table or the ledger.
    pub fn is_complete(&self, key: &CompositeKey) -> HarvestResult<bool> {
        if self.table.contains_key(key) {
            return Ok(true);
        }
        Ok(self.ledger.contains(key)?)
    }

    /// Walk the whole grid once, then write the CSV export.
    pub async fn run(&mut self) -> HarvestResult<RunSummary> {
        let grid = self.config.grid.clone();
        let progress = ProgressTracker::new(grid.len());
        let mut summary = RunSummary {
            total: grid.len(),
            ..RunSummary::default()
        };

        for (index, point) in grid.points().enumerate() {
            self.table.sort_index();
            if self.is_complete(&point.key())? {
                summary.skipped += 1;
                continue;
            }

            match self.harvest_point(index, &point, &progress).await? {
                PointOutcome::Saved { rows, attempts } => {
                    summary.fetched += 1;
                    summary.rows_added += rows;
                    summary.requests += attempts as usize;
                }
                PointOutcome::Abandoned { attempts } => {
                    summary.abandoned += 1;
                    summary.requests += attempts as usize;
                }
                PointOutcome::Empty { attempts } => {
                    summary.empty += 1;
                    summary.requests += attempts as usize;
                }
            }
        }

        self.export()?;

        tracing::info!(
            "Run finished: {} fetched, {} skipped, {} abandoned, {} empty, {} rows added, {} requests",
            summary.fetched,
            summary.skipped,
            summary.abandoned,
            summary.empty,
            summary.rows_added,
            summary.requests
        );
        Ok(summary)
    }

    /// Fetch one grid point under the retry policy.
    ///
    /// Attempt failures never escape; only persistence failures do.
    pub async fn harvest_point(
        &mut self,
        index: usize,
        point: &GridPoint,
        progress: &ProgressTracker,
    ) -> HarvestResult<PointOutcome> {
        let policy = self.config.retry;
        let mut attempt = 1;

        loop {
            progress.announce(index, point);

            let error = match self.attempt(point).await {
                Ok(batch) if batch.is_empty() => {
                    tracing::warn!("No data rows for {}, will retry on a later run", point.key());
                    self.ledger
                        .mark_abandoned(&point.key(), attempt, "table has no data rows")?;
                    return Ok(PointOutcome::Empty { attempts: attempt });
                }
                Ok(batch) => {
                    let rows = batch.len();
                    self.commit(point, batch)?;
                    return Ok(PointOutcome::Saved {
                        rows,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_attempt_failure() => e,
                Err(e) => return Err(e),
            };

            tracing::warn!("Server error {error} ! (attempt {attempt}/{})", policy.max_attempts);

            if !policy.should_retry(attempt, &error) {
                if !error.is_retryable() {
                    tracing::warn!("Not retrying {}: permanent failure", point.key());
                }
                self.ledger
                    .mark_abandoned(&point.key(), attempt, &error.to_string())?;
                return Ok(PointOutcome::Abandoned { attempts: attempt });
            }

            let delay = policy.delay_after(attempt);
            if !delay.is_zero() {
                tracing::debug!("Backing off for {delay:?}");
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn attempt(&self, point: &GridPoint) -> HarvestResult<OpacityTable> {
        let url = self
            .config
            .template
            .build_url(point)
            .map_err(|e| HarvestError::InvalidGridPoint(e.to_string()))?;
        tracing::debug!("GET {url}");

        let body = self.source.fetch(&url).await?;
        parse_opacity_table(&body, point)
    }

    /// Merge a parsed batch, rewrite the snapshot, then mark the key done.
    fn commit(&mut self, point: &GridPoint, batch: OpacityTable) -> HarvestResult<()> {
        let rows = batch.len();
        self.table.merge(batch);
        self.table.sort_index();
        SnapshotWriter::write_to_file(&self.table, &self.config.snapshot_path())?;
        self.ledger.mark_completed(&point.key(), rows)?;
        tracing::info!("Dataframe saved ({rows} rows for {})", point.key());
        Ok(())
    }

    /// Write the CSV export of the current table.
    pub fn export(&self) -> HarvestResult<()> {
        let path = self.config.export_path();
        CsvExporter::write_to_file(&self.table, &path)?;
        tracing::info!("Exported {} rows to {}", self.table.len(), path.display());
        Ok(())
    }
}
