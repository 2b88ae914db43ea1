//! # waterfall - Commit History Graph Ingestion
//!
//! Reads the full commit history of a git repository and records it in a
//! property graph: one `Repository` node per source, one `Author` node per
//! author email, and one `COMMIT` edge per commit hash from its author to the
//! repository. Every write is a keyed merge, so re-running over the same
//! repository changes nothing.
//!
//! ## Architecture
//!
//! ```text
//! source location
//!       │
//! ┌─────▼──────────┐  clone / reuse / fetch (git2)
//! │  git::source   │──────────────────────────────► working copy
//! └─────┬──────────┘
//!       │ CommitRecord, one at a time
//! ┌─────▼──────────┐
//! │  git::walker   │  HEAD + refs/*, topological order
//! └─────┬──────────┘
//!       │
//! ┌─────▼──────────┐  bootstrap, repository, author, link
//! │    loader      │──────────────────────────────► GraphStore (SQLite)
//! └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`git`]: Working copy acquisition and history walking
//! - [`graph`]: Graph store trait and the embedded SQLite store
//! - [`loader`]: Idempotent graph mutations and load counters
//! - [`pipeline`]: One ingestion run and its stage machine
//! - [`config`]: Layered configuration (file, environment, flags)
//! - [`cli`]: Command-line parsing
//! - [`error`]: Error types and result aliases
//! - [`paths`]: Platform data and config directories
//!
//! ## Usage Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use waterfall::config::{Config, RunConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let run = RunConfig::new("https://github.com/acme/myrepo.git", &config);
//!
//!     let report = waterfall::pipeline::run(&run, &CancellationToken::new())?;
//!     println!("{} commits", report.load.commits_seen);
//!     Ok(())
//! }
//! ```

/// Command-line surface
pub mod cli;

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Git working copies and commit history
pub mod git;

/// Property graph persistence
pub mod graph;

/// Graph loading of commit history
pub mod loader;

/// Platform-specific directories
pub mod paths;

/// Ingestion runs
pub mod pipeline;

pub use error::{Result, WaterfallError};
