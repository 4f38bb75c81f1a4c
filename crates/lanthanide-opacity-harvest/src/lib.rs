//! Resumable harvester for the NIST lanthanide/actinide opacity tables.
//!
//! Walks the parameter grid, fetches each point's HTML table, merges the
//! rows into one indexed table and persists it after every success, so an
//! interrupted run picks up where it stopped.

pub mod cli;
pub mod config;
pub mod error;
pub mod harvester;
pub mod http_client;
pub mod parse;
pub mod progress;
pub mod retry;
pub mod source;

pub use config::{resolve_data_dir, HarvestConfig};
pub use error::{HarvestError, HarvestResult};
pub use harvester::{Harvester, PointOutcome, RunSummary};
pub use http_client::HttpClient;
pub use parse::{extract_first_table, parse_opacity_table, RawTable};
pub use progress::ProgressTracker;
pub use retry::RetryPolicy;
pub use source::TableSource;
