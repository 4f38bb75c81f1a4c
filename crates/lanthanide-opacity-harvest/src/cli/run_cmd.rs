//! `opacity-harvest run`: walk the grid against the live endpoint.

use anyhow::{Context, Result};

use crate::config::HarvestConfig;
use crate::harvester::{Harvester, RunSummary};
use crate::http_client::HttpClient;

/// Harvest every grid point not yet complete, then export the CSV.
pub async fn run(config: HarvestConfig) -> Result<RunSummary> {
    tracing::info!("Data dir: {}", config.data_dir().display());
    tracing::info!("Endpoint: {}", config.template.base_url());
    tracing::info!(
        "Grid: {} points, {} attempts per point, {:?} timeout",
        config.grid.len(),
        config.retry.max_attempts,
        config.timeout
    );

    let client = HttpClient::new(config.timeout)?;
    let mut harvester = Harvester::open(config, client).context("failed to open data directory")?;
    let summary = harvester.run().await?;

    if summary.abandoned > 0 {
        tracing::warn!(
            "{} grid points were abandoned; run again to retry them",
            summary.abandoned
        );
    }
    Ok(summary)
}
