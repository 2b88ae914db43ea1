//! Command-line surface

use crate::config::{Config, RunConfig};
use crate::error::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "waterfall", author, version, long_version = LONG_VERSION, about)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a repository's commit history into the graph
    Source(SourceArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Repository URL, scp-like address or local path
    #[arg(short, long)]
    pub repository: String,

    /// Graph store connection string (sqlite://<path>, sqlite::memory:, file:<path>)
    #[arg(short = 'u', long)]
    pub graph_uri: Option<String>,

    /// Root directory for working copies
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Reuse an existing working copy without fetching
    #[arg(long)]
    pub offline: bool,

    /// Configuration file (TOML)
    #[arg(long, env = "WATERFALL_CONFIG")]
    pub config: Option<PathBuf>,
}

impl SourceArgs {
    /// Layer these flags over the loaded configuration
    pub fn run_config(&self) -> Result<RunConfig> {
        let config = Config::load(self.config.as_deref())?;
        Ok(self.apply(RunConfig::new(&self.repository, &config)))
    }

    fn apply(&self, mut run: RunConfig) -> RunConfig {
        if let Some(uri) = &self.graph_uri {
            run = run.with_graph_uri(uri);
        }
        if let Some(workdir) = &self.workdir {
            run = run.with_workdir(workdir);
        }
        run.offline(self.offline)
    }
}

impl Cli {
    /// Default `EnvFilter` directives for the verbosity level
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn,waterfall=info",
            1 => "info,waterfall=debug",
            _ => "debug,waterfall=trace",
        }
    }
}

/// Exit code when a second Ctrl-C ends the process
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What to do on the `received`-th Ctrl-C of a run (1-based)
///
/// Only acquisition watches the cancellation token, so the first signal asks
/// politely and any later one leaves at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancel,
    Exit,
}

impl Interrupt {
    pub fn nth(received: usize) -> Self {
        if received <= 1 {
            Interrupt::Cancel
        } else {
            Interrupt::Exit
        }
    }
}
