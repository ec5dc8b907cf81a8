//! # Repo Insight CLI (`repo-insight`)
//!
//! ## Usage
//!
//! ```bash
//! repo-insight --config ./config/repo-insight.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-insight serve` | Start the HTTP API |
//! | `repo-insight analyze <URL>` | Analyze a repository and print the report as JSON |
//! | `repo-insight completions <SHELL>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Analyze the 300 most recent commits without per-file detail
//! GITHUB_TOKEN=ghp_... repo-insight analyze https://github.com/octo/widgets \
//!     --max-commits 300 --no-deep
//!
//! # Write the report to a file with JSON progress on stderr
//! repo-insight analyze https://github.com/octo/widgets --output report.json --progress json
//!
//! # Serve the API
//! GEMINI_API_KEY=... repo-insight serve
//! ```

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use repo_insight::config;
use repo_insight::jobs::{AnalysisRequest, JobOrchestrator};
use repo_insight::progress::ProgressMode;
use repo_insight::server;

/// Repo Insight: contributor expertise, bus factor, stale files and hot
/// spots from a repository's commit history.
#[derive(Parser)]
#[command(
    name = "repo-insight",
    about = "Repo Insight: knowledge-risk analysis for GitHub repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/repo-insight.toml`. A missing file means
    /// built-in defaults.
    #[arg(long, global = true, default_value = "./config/repo-insight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Analyze a repository and wait for the report.
    ///
    /// The report is printed to stdout as JSON (or written to `--output`);
    /// progress goes to stderr.
    Analyze {
        /// Repository URL, e.g. `https://github.com/owner/repo`.
        url: String,

        /// Workspace id to record the run under (generated if omitted).
        #[arg(long)]
        workspace_id: Option<String>,

        /// Most recent commits to analyze.
        #[arg(long)]
        max_commits: Option<usize>,

        /// Skip per-commit file detail; only author-level statistics.
        #[arg(long)]
        no_deep: bool,

        /// Write the report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "repo-insight", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze {
            url,
            workspace_id,
            max_commits,
            no_deep,
            output,
            progress,
        } => {
            let jobs = JobOrchestrator::from_config(&cfg)?;
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let request = AnalysisRequest {
                github_url: url,
                workspace_id,
                max_commits,
                deep_analysis: Some(!no_deep),
            };
            let report = jobs.run_sync(request, reporter).await?;
            let json = serde_json::to_string_pretty(report.as_ref())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write report: {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}
