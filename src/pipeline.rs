//! One ingestion run, from source location to graph
//!
//! The source is acquired and its walk opened before the store is touched,
//! so a bad source never leaves anything in the graph. After that the run is
//! a straight loop: bootstrap, repository, then author and link per commit.
//! The first failure ends the run; what was already written stays.

use crate::config::RunConfig;
use crate::error::{HistoryError, Result, WaterfallError};
use crate::git::{Acquisition, CommitRecord, ObtainOptions, SourceLocation, obtain};
use crate::graph::{CommitLink, GraphStats, GraphStore, SqliteGraphStore};
use crate::loader::{GraphLoader, LoadReport};
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where a run is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    BootstrapSchema,
    EnsureRepositoryNode,
    EnsureAuthorNode,
    LinkCommit,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub repository_id: String,
    pub acquisition: Acquisition,
    pub load: LoadReport,
    pub stats: GraphStats,
    pub duration_ms: u64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({:?}): {} commits ({} new, {} already recorded), {} new authors in {} ms",
            self.repository_id,
            self.acquisition,
            self.load.commits_seen,
            self.load.links_created,
            self.load.links_matched,
            self.load.authors_created,
            self.duration_ms
        )?;
        write!(
            f,
            "graph: {} repositories, {} authors, {} commits",
            self.stats.repositories, self.stats.authors, self.stats.commits
        )
    }
}

/// Ingest `config.repository` into the store at `config.graph_uri`
///
/// Blocking; call it from a blocking task when inside an async runtime.
pub fn run(config: &RunConfig, cancel: &CancellationToken) -> Result<RunReport> {
    let start = Instant::now();

    let location = SourceLocation::parse(&config.repository)?;
    let options = ObtainOptions {
        workdir: config.workdir.clone(),
        refresh_existing: config.refresh_existing,
    };
    let copy = obtain(&location, &options, cancel)?;
    let commits = copy.commits()?;

    let store = SqliteGraphStore::open(&config.graph_uri, config.busy_timeout)
        .map_err(WaterfallError::Connection)?;
    let mut loader = GraphLoader::new(store);

    let load = ingest(&mut loader, copy.repository_id(), commits)?;
    let stats = loader.store().stats().map_err(WaterfallError::Connection)?;

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Ingested {} commits of {} in {} ms ({} new, {} already recorded)",
        load.commits_seen,
        copy.repository_id(),
        duration_ms,
        load.links_created,
        load.links_matched
    );

    Ok(RunReport {
        repository_id: copy.repository_id().to_string(),
        acquisition: copy.acquisition(),
        load,
        stats,
        duration_ms,
    })
}

/// Drive the loader over a commit sequence for one repository
pub fn ingest<S, I>(
    loader: &mut GraphLoader<S>,
    repository_id: &str,
    commits: I,
) -> Result<LoadReport>
where
    S: GraphStore,
    I: IntoIterator<Item = std::result::Result<CommitRecord, HistoryError>>,
{
    let mut stage = RunStage::Start;
    match load_all(loader, repository_id, commits, &mut stage) {
        Ok(()) => {
            advance(&mut stage, RunStage::Done);
            Ok(loader.report().clone())
        }
        Err(e) => {
            tracing::debug!("Run failed during {}: {}", stage, e);
            advance(&mut stage, RunStage::Failed);
            Err(e)
        }
    }
}

fn load_all<S, I>(
    loader: &mut GraphLoader<S>,
    repository_id: &str,
    commits: I,
    stage: &mut RunStage,
) -> Result<()>
where
    S: GraphStore,
    I: IntoIterator<Item = std::result::Result<CommitRecord, HistoryError>>,
{
    advance(stage, RunStage::BootstrapSchema);
    loader.bootstrap()?;

    advance(stage, RunStage::EnsureRepositoryNode);
    loader.upsert_repository(repository_id)?;

    for commit in commits {
        let commit = commit?;

        advance(stage, RunStage::EnsureAuthorNode);
        loader.upsert_author(&commit.author_email)?;

        advance(stage, RunStage::LinkCommit);
        loader.link_commit(CommitLink {
            repository_id,
            author_email: &commit.author_email,
            hash: &commit.hash,
            timestamp: &commit.timestamp,
        })?;
    }
    Ok(())
}

fn advance(stage: &mut RunStage, next: RunStage) {
    match next {
        // Once per commit
        RunStage::EnsureAuthorNode | RunStage::LinkCommit => {
            tracing::trace!("{} -> {}", stage, next)
        }
        _ => tracing::debug!("{} -> {}", stage, next),
    }
    *stage = next;
}
