//! Configuration loading and resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lanthanide_opacity::{Grid, QueryTemplate};

use crate::error::HarvestResult;
use crate::http_client::DEFAULT_TIMEOUT;
use crate::retry::RetryPolicy;

/// Binary snapshot of the accumulated table.
pub const SNAPSHOT_FILE: &str = "lanthanide_actinide-opacity-database.pkl";

/// Flattened CSV export.
pub const EXPORT_FILE: &str = "lanthanide_actinide-opacity-database.csv";

/// Completion ledger.
pub const LEDGER_FILE: &str = "lanthanide_actinide-opacity-database.ledger.sqlite";

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "OPACITY_DATA_DIR";

/// Resolve the data directory: explicit flag, then `OPACITY_DATA_DIR`,
/// then the current directory.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(dir) = explicit {
        return PathBuf::from(dir);
    }

    if let Ok(env_dir) = std::env::var(DATA_DIR_ENV) {
        if !env_dir.is_empty() {
            return PathBuf::from(env_dir);
        }
    }

    PathBuf::from(".")
}

/// Everything a harvest run needs.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub data_dir: PathBuf,
    pub grid: Grid,
    pub template: QueryTemplate,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl HarvestConfig {
    /// Standard lanthanide/actinide harvest against NIST, stored in `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> HarvestResult<Self> {
        Ok(Self {
            data_dir: data_dir.into(),
            grid: Grid::default(),
            template: QueryTemplate::nist()?,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> HarvestResult<Self> {
        self.template = self.template.with_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn export_path(&self) -> PathBuf {
        self.data_dir.join(EXPORT_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_dir_wins() {
        assert_eq!(resolve_data_dir(Some("/tmp/opac")), PathBuf::from("/tmp/opac"));
    }

    #[test]
    fn test_default_paths() {
        let config = HarvestConfig::new("/data").unwrap();
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/data/lanthanide_actinide-opacity-database.pkl")
        );
        assert_eq!(
            config.export_path(),
            PathBuf::from("/data/lanthanide_actinide-opacity-database.csv")
        );
        assert!(config.ledger_path().starts_with("/data"));
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.grid.len(), 12_852);
    }

    #[test]
    fn test_base_url_override() {
        let config = HarvestConfig::new(".")
            .unwrap()
            .with_base_url("http://localhost:8080/osearch.py")
            .unwrap();
        assert_eq!(config.template.base_url().port(), Some(8080));
        assert!(HarvestConfig::new(".").unwrap().with_base_url("::").is_err());
    }
}
