//! Loading commit history into a graph store
//!
//! [`GraphLoader`] issues the keyed merges in the order the graph needs:
//! constraints first, the repository once, then per commit its author
//! before the link.

use crate::error::{Result, WaterfallError};
use crate::graph::{CommitLink, Constraint, GraphStore, Outcome, Statement};
use crate::pipeline::RunStage;

/// Counters for one load, reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Commits handed to [`GraphLoader::link_commit`]
    pub commits_seen: usize,
    /// Commit links written by this run
    pub links_created: usize,
    /// Commit links that were already recorded
    pub links_matched: usize,
    /// Author nodes written by this run
    pub authors_created: usize,
    /// Whether this run created the repository node
    pub repository_created: bool,
}

/// Applies ingestion mutations to a [`GraphStore`]
pub struct GraphLoader<S> {
    store: S,
    report: LoadReport,
}

impl<S: GraphStore> GraphLoader<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            report: LoadReport::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Declare the uniqueness constraints
    ///
    /// Constraints declared by an earlier run are skipped. Any other failure
    /// stops the run before a node is written.
    pub fn bootstrap(&mut self) -> Result<()> {
        for constraint in Constraint::ALL {
            let outcome = self
                .store
                .execute(Statement::DeclareConstraint(constraint))
                .map_err(|source| WaterfallError::SchemaBootstrap {
                    constraint: constraint.name().to_string(),
                    source,
                })?;

            match outcome {
                Outcome::Created => tracing::info!("Declared constraint {}", constraint),
                Outcome::ConstraintExists | Outcome::Matched => {
                    tracing::debug!("Constraint {} already exists", constraint)
                }
            }
        }
        Ok(())
    }

    pub fn upsert_repository(&mut self, id: &str) -> Result<Outcome> {
        let outcome = self
            .store
            .execute(Statement::MergeRepository { id })
            .map_err(|source| WaterfallError::Write {
                stage: RunStage::EnsureRepositoryNode,
                source,
            })?;

        if outcome == Outcome::Created {
            self.report.repository_created = true;
            tracing::info!("Created repository node {}", id);
        }
        Ok(outcome)
    }

    pub fn upsert_author(&mut self, email: &str) -> Result<Outcome> {
        let outcome = self
            .store
            .execute(Statement::MergeAuthor { email })
            .map_err(|source| WaterfallError::Write {
                stage: RunStage::EnsureAuthorNode,
                source,
            })?;

        if outcome == Outcome::Created {
            self.report.authors_created += 1;
            tracing::debug!("Created author node {:?}", email);
        }
        Ok(outcome)
    }

    /// Link a commit to its repository, keyed by hash
    ///
    /// The author and the repository must already exist.
    pub fn link_commit(&mut self, link: CommitLink<'_>) -> Result<Outcome> {
        self.report.commits_seen += 1;

        let outcome = self
            .store
            .execute(Statement::MergeCommit(link))
            .map_err(|source| WaterfallError::Write {
                stage: RunStage::LinkCommit,
                source,
            })?;

        match outcome {
            Outcome::Created => self.report.links_created += 1,
            _ => self.report.links_matched += 1,
        }
        tracing::trace!("Commit {} {:?}", link.hash, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::graph::{GraphStats, SqliteGraphStore};

    /// Records statements and fails the `fail_at`-th one (0-based)
    struct ScriptedStore {
        executed: Vec<String>,
        fail_at: Option<usize>,
        outcome: Outcome,
    }

    impl ScriptedStore {
        fn new(outcome: Outcome) -> Self {
            Self {
                executed: Vec::new(),
                fail_at: None,
                outcome,
            }
        }

        fn failing_at(index: usize) -> Self {
            Self {
                fail_at: Some(index),
                ..Self::new(Outcome::Created)
            }
        }
    }

    impl GraphStore for ScriptedStore {
        fn execute(&mut self, statement: Statement<'_>) -> std::result::Result<Outcome, StoreError> {
            if self.fail_at == Some(self.executed.len()) {
                return Err(StoreError::ConnectionFailed {
                    uri: "scripted".to_string(),
                    reason: "store went away".to_string(),
                });
            }
            self.executed.push(format!("{:?}", statement));
            Ok(self.outcome)
        }

        fn stats(&self) -> std::result::Result<GraphStats, StoreError> {
            Ok(GraphStats::default())
        }
    }

    fn link<'a>(hash: &'a str, author_email: &'a str) -> CommitLink<'a> {
        CommitLink {
            repository_id: "myrepo",
            author_email,
            hash,
            timestamp: "2024-01-01T00:00:00Z",
        }
    }

    #[test]
    fn test_bootstrap_declares_all_constraints() {
        let mut loader = GraphLoader::new(ScriptedStore::new(Outcome::Created));
        loader.bootstrap().unwrap();

        let executed = &loader.store().executed;
        assert_eq!(executed.len(), 3);
        assert!(executed[0].contains("RepositoryId"));
        assert!(executed[1].contains("AuthorId"));
        assert!(executed[2].contains("CommitHash"));
    }

    #[test]
    fn test_bootstrap_tolerates_existing_constraints() {
        let mut loader = GraphLoader::new(ScriptedStore::new(Outcome::ConstraintExists));
        assert!(loader.bootstrap().is_ok());
    }

    #[test]
    fn test_bootstrap_twice_on_real_store() {
        let mut loader = GraphLoader::new(SqliteGraphStore::open_in_memory().unwrap());
        loader.bootstrap().unwrap();
        loader.bootstrap().unwrap();
    }

    #[test]
    fn test_bootstrap_failure_names_constraint() {
        let mut loader = GraphLoader::new(ScriptedStore::failing_at(1));
        let err = loader.bootstrap().unwrap_err();

        match err {
            WaterfallError::SchemaBootstrap { constraint, .. } => {
                assert_eq!(constraint, "unique_author_id")
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing after the failing declaration is attempted
        assert_eq!(loader.store().executed.len(), 1);
    }

    #[test]
    fn test_write_failure_carries_stage() {
        let mut loader = GraphLoader::new(ScriptedStore::failing_at(0));
        let err = loader.upsert_author("alice@x").unwrap_err();
        assert_eq!(err.stage(), Some(RunStage::EnsureAuthorNode));

        let mut loader = GraphLoader::new(ScriptedStore::failing_at(0));
        let err = loader.link_commit(link("abc", "alice@x")).unwrap_err();
        assert_eq!(err.stage(), Some(RunStage::LinkCommit));
        assert_eq!(loader.report().commits_seen, 1);
        assert_eq!(loader.report().links_created, 0);
    }

    #[test]
    fn test_report_counts_created_and_matched() {
        let mut loader = GraphLoader::new(SqliteGraphStore::open_in_memory().unwrap());
        loader.bootstrap().unwrap();
        loader.upsert_repository("myrepo").unwrap();

        for (hash, email) in [("h1", "alice@x"), ("h2", "bob@x"), ("h1", "alice@x")] {
            loader.upsert_author(email).unwrap();
            loader.link_commit(link(hash, email)).unwrap();
        }

        let report = loader.report();
        assert!(report.repository_created);
        assert_eq!(report.commits_seen, 3);
        assert_eq!(report.links_created, 2);
        assert_eq!(report.links_matched, 1);
        assert_eq!(report.authors_created, 2);
    }

    #[test]
    fn test_link_before_author_is_rejected() {
        let mut loader = GraphLoader::new(SqliteGraphStore::open_in_memory().unwrap());
        loader.upsert_repository("myrepo").unwrap();

        let err = loader.link_commit(link("h1", "alice@x")).unwrap_err();
        assert!(matches!(
            err,
            WaterfallError::Write {
                source: StoreError::MissingEndpoint { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_upsert_repository_matched_on_rerun() {
        let mut store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .execute(Statement::MergeRepository { id: "myrepo" })
            .unwrap();

        let mut loader = GraphLoader::new(store);
        assert_eq!(loader.upsert_repository("myrepo").unwrap(), Outcome::Matched);
        assert!(!loader.report().repository_created);
    }
}
