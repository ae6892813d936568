use anyhow::Result;
use clap::{Parser, Subcommand};
use jobrun_core::config;

mod commands;

/// Top-level CLI for the jobrun scheduler.
#[derive(Debug, Parser)]
#[command(name = "jobrun")]
#[command(about = "jobrun: bounded-concurrency job runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a synthetic batch at several concurrency levels and report.
    Bench {
        /// Number of synthetic jobs per run.
        #[arg(long, default_value_t = 16)]
        jobs: usize,

        /// Simulated work per job, in milliseconds.
        #[arg(long, default_value_t = 50)]
        work_ms: u64,
    },

    /// Query the configured search feed.
    Search {
        /// Search terms.
        query: String,

        /// 1-based start index into the feed.
        #[arg(long, default_value_t = 1)]
        start: usize,

        /// Maximum number of results (capped by config).
        #[arg(long, default_value_t = 10)]
        max: usize,
    },

    /// Fetch a thumbnail image to a local file.
    Thumb {
        /// Image URL.
        url: String,

        /// Output file path.
        out: std::path::PathBuf,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Bench { jobs, work_ms } => commands::bench::run(jobs, work_ms),
            CliCommand::Search { query, start, max } => {
                commands::search::run(&cfg, query, start, max)
            }
            CliCommand::Thumb { url, out } => commands::thumb::run(&cfg, url, &out),
        }
    }
}
