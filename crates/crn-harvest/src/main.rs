// Copyright 2026 crn-harvest Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use crn_harvest::cli;
use crn_harvest::cli::harvest_cmd::HarvestArgs;
use crn_harvest::Granularity;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "crn-harvest",
    about = "crn-harvest - Bulk export of Florida civil remedy notice filings",
    version,
    after_help = "Run 'crn-harvest <command> --help' for details on each command.\nRun 'crn-harvest' with no command to harvest with default settings."
)]
struct Cli {
    /// Output results as JSON lines (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every range of the year span, retrying refused ranges at finer granularity
    Harvest(HarvestArgs),
    /// Combine downloaded exports into one CSV per year
    Aggregate {
        /// Directory the yearly files are written to [env: CRN_TARGET_DIR]
        #[arg(long)]
        target_dir: Option<PathBuf>,
        /// Directory holding res-*.csv exports (defaults to the target directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List the ranges a pass at one granularity would search
    Periods {
        /// day, 3-day, week, half-month, month, quarter or year
        granularity: Granularity,
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
    },
    /// Check environment and diagnose issues
    Doctor {
        /// Download directory to inspect [env: CRN_DOWNLOAD_DIR]
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Global flags are read through env vars by the output helpers
    if cli.json {
        std::env::set_var(cli::output::ENV_JSON, "1");
    }
    if cli.quiet {
        std::env::set_var(cli::output::ENV_QUIET, "1");
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let result = match cli.command {
        None => cli::harvest_cmd::run(HarvestArgs::default()).await,
        Some(Commands::Harvest(args)) => cli::harvest_cmd::run(args).await,
        Some(Commands::Aggregate {
            target_dir,
            data_dir,
        }) => cli::aggregate_cmd::run(target_dir, data_dir),
        Some(Commands::Periods {
            granularity,
            start_year,
            end_year,
        }) => cli::periods_cmd::run(granularity, start_year, end_year),
        Some(Commands::Doctor { download_dir }) => cli::doctor::run(download_dir),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "crn-harvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
