use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vigil::output::Format;
use vigil::VigilError;

mod cli;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Repository scan lifecycle - orchestrate scanners, track freshness, diff findings")]
#[command(version)]
struct Cli {
    /// Working directory for config discovery (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a profile's scanners against a cloned repository
    Scan {
        /// Path to the repository to scan
        target: String,

        /// Profile to run (defaults to "default")
        profile: Option<String>,

        /// Bypass the freshness gate and always scan
        #[arg(long)]
        force: bool,

        /// Skip scanners marked slow in config
        #[arg(long)]
        skip_slow: bool,
    },

    /// Re-scan tracked repositories whose data is stale
    Refresh {
        /// Refresh only this tracked repository
        repo: Option<String>,

        /// Bypass the freshness gate for every selected repository
        #[arg(long)]
        force: bool,

        /// Select all tracked repositories, not just stale ones
        #[arg(long)]
        all: bool,

        /// Repositories scanned concurrently
        #[arg(long, default_value_t = 2)]
        parallel: usize,
    },

    /// Compare findings between two historical scans
    Diff {
        /// Tracked repository
        repo: String,

        /// Baseline scan ref: latest, latest~N, scan id, or commit prefix
        /// (defaults to latest~1)
        baseline: Option<String>,

        /// Compare scan ref (defaults to latest)
        compare: Option<String>,

        /// Restrict output to one scanner
        #[arg(long)]
        scanner: Option<String>,

        /// Restrict output to one severity
        #[arg(long)]
        severity: Option<String>,

        /// Fuzzy line-proximity matching (default on)
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        fuzzy: bool,

        /// Line tolerance for fuzzy matching
        #[arg(long, default_value_t = 5)]
        tolerance: i64,

        /// Only show new findings
        #[arg(long)]
        new_only: bool,

        /// Only show fixed findings
        #[arg(long)]
        fixed_only: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },

    /// Show a repository's scan history
    History {
        /// Tracked repository
        repo: String,

        /// Most recent scans to show
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List configured scanners
    Scanners,

    /// Initialize a new .vigil/config.toml configuration file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let work_dir = cli.path.unwrap_or_else(|| PathBuf::from("."));

    let result = run(cli.command, &work_dir).await;
    std::process::exit(match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            // Invalid profile/scanner configuration exits 2, operational
            // failures exit 1.
            e.downcast_ref::<VigilError>()
                .map(VigilError::exit_code)
                .unwrap_or(1)
        }
    });
}

async fn run(command: Commands, work_dir: &std::path::Path) -> Result<i32> {
    match command {
        Commands::Scan {
            target,
            profile,
            force,
            skip_slow,
        } => {
            let profile = profile.unwrap_or_else(|| "default".to_string());
            cli::scan::scan_command(work_dir, &target, &profile, force, skip_slow).await
        }
        Commands::Refresh {
            repo,
            force,
            all,
            parallel,
        } => cli::refresh::refresh_command(work_dir, repo, force, all, parallel).await,
        Commands::Diff {
            repo,
            baseline,
            compare,
            scanner,
            severity,
            fuzzy,
            tolerance,
            new_only,
            fixed_only,
            format,
        } => {
            cli::diff::diff_command(
                work_dir, &repo, baseline, compare, scanner, severity, fuzzy, tolerance,
                new_only, fixed_only, format,
            )
            .await
        }
        Commands::History { repo, limit, json } => {
            cli::history::history_command(work_dir, &repo, limit, json).await
        }
        Commands::Scanners => cli::scanners::scanners_command(work_dir).await,
        Commands::Init { force } => cli::init::init_command(work_dir, force).await,
    }
}
