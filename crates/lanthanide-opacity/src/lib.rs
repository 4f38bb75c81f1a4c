//! Lanthanide/actinide opacity database: parameter grid, query URLs,
//! indexed opacity tables, binary snapshots, CSV export and a completion
//! ledger for resumable harvests.

pub mod export;
pub mod grid;
pub mod ledger;
pub mod literal;
pub mod query;
pub mod storage;
pub mod types;

pub use export::CsvExporter;
pub use grid::{mass_density, Grid, GridPoint};
pub use ledger::{AbandonedPoint, CompletionLedger};
pub use literal::{parse_decimal, NumericLiteral};
pub use query::{OpacityKind, QueryTemplate, DEFAULT_BASE_URL};
pub use storage::{SnapshotReader, SnapshotWriter};
pub use types::*;
