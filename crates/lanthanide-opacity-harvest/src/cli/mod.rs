//! Subcommand implementations for the `opacity-harvest` binary.

pub mod export_cmd;
pub mod run_cmd;
pub mod status_cmd;
pub mod validate_cmd;
