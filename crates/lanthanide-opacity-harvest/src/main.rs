//! opacity-harvest: entry point.

use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use lanthanide_opacity_harvest::cli::{export_cmd, run_cmd, status_cmd, validate_cmd};
use lanthanide_opacity_harvest::config::{resolve_data_dir, HarvestConfig};
use lanthanide_opacity_harvest::retry::RetryPolicy;

#[derive(Parser)]
#[command(
    name = "opacity-harvest",
    about = "Resumable harvester for the NIST lanthanide/actinide opacity database",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every grid point not yet stored (default).
    Run(RunArgs),

    /// Rewrite the CSV export from the snapshot without fetching.
    Export {
        /// Directory holding the snapshot. Also reads OPACITY_DATA_DIR.
        #[arg(short, long)]
        data_dir: Option<String>,
    },

    /// Show how many grid points are done, remaining and abandoned.
    Status {
        /// Directory holding the snapshot. Also reads OPACITY_DATA_DIR.
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Load the snapshot and check it.
    Validate {
        /// Directory holding the snapshot. Also reads OPACITY_DATA_DIR.
        #[arg(short, long)]
        data_dir: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   opacity-harvest completions bash > ~/.local/share/bash-completion/completions/opacity-harvest
    ///   opacity-harvest completions zsh > ~/.zfunc/_opacity-harvest
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Directory for the snapshot, CSV and ledger. Also reads OPACITY_DATA_DIR.
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Query endpoint.
    #[arg(long)]
    base_url: Option<String>,

    /// Attempts per grid point [default: 3].
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,

    /// Per-request timeout in seconds [default: 15].
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Delay before the first retry in milliseconds, doubling after each
    /// failure; 0 retries immediately [default: 500].
    #[arg(long)]
    backoff_ms: Option<u64>,
}

impl RunArgs {
    fn into_config(self) -> Result<HarvestConfig> {
        let data_dir = resolve_data_dir(self.data_dir.as_deref());
        let mut config = HarvestConfig::new(data_dir)?;

        if let Some(url) = self.base_url.as_deref() {
            config = config.with_base_url(url)?;
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        let mut retry = RetryPolicy::default();
        if let Some(n) = self.max_attempts {
            retry.max_attempts = n;
        }
        match self.backoff_ms {
            Some(0) => retry = RetryPolicy::no_backoff(retry.max_attempts),
            Some(ms) => retry.base_delay = Duration::from_millis(ms),
            None => {}
        }
        Ok(config.with_retry(retry))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let config = args.into_config()?;
            run_cmd::run(config).await?;
        }

        Commands::Export { data_dir } => {
            export_cmd::run(&resolve_data_dir(data_dir.as_deref()))?;
        }

        Commands::Status { data_dir, json } => {
            status_cmd::run(&resolve_data_dir(data_dir.as_deref()), json)?;
        }

        Commands::Validate { data_dir } => {
            validate_cmd::run(&resolve_data_dir(data_dir.as_deref()))?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "opacity-harvest", &mut std::io::stdout());
        }
    }

    Ok(())
}
