//! Property graph persistence for repositories, authors and commits
//!
//! The loader talks to the store only through [`GraphStore::execute`], one
//! keyed statement at a time. Every statement is a merge, so replaying it
//! leaves the graph unchanged.

pub mod sqlite;

pub use sqlite::{GraphUri, SqliteGraphStore};

use crate::error::StoreError;
use std::fmt;

/// Node labels present in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Repository,
    Author,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Repository => "Repository",
            NodeLabel::Author => "Author",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of the edge from an author to a repository, one per commit
pub const COMMIT_LABEL: &str = "COMMIT";

/// Uniqueness constraints declared before ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Repository nodes are unique by id
    RepositoryId,
    /// Author nodes are unique by email
    AuthorId,
    /// Commit links are unique by hash across all repositories
    CommitHash,
}

impl Constraint {
    pub const ALL: [Constraint; 3] = [
        Constraint::RepositoryId,
        Constraint::AuthorId,
        Constraint::CommitHash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Constraint::RepositoryId => "unique_repository_id",
            Constraint::AuthorId => "unique_author_id",
            Constraint::CommitHash => "unique_commit_hash",
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A commit's link between its author and its repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitLink<'a> {
    pub repository_id: &'a str,
    pub author_email: &'a str,
    pub hash: &'a str,
    pub timestamp: &'a str,
}

/// The statement shapes the loader issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement<'a> {
    /// Declare a uniqueness constraint
    DeclareConstraint(Constraint),
    /// Match or create a Repository node by id
    MergeRepository { id: &'a str },
    /// Match or create an Author node by email
    MergeAuthor { email: &'a str },
    /// Match or create the COMMIT edge for a hash
    MergeCommit(CommitLink<'a>),
}

/// Result of a statement that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new node, edge or constraint was written
    Created,
    /// The keyed entity already existed and was left unchanged
    Matched,
    /// The constraint was declared by an earlier run
    ConstraintExists,
}

/// Entity counts, used by the run summary and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub repositories: usize,
    pub authors: usize,
    pub commits: usize,
    /// Commit links per author email, sorted by email
    pub commits_by_author: Vec<(String, usize)>,
}

/// A transactional graph store
///
/// Each call to [`execute`](GraphStore::execute) is atomic on its own.
pub trait GraphStore {
    /// Run one statement
    fn execute(&mut self, statement: Statement<'_>) -> Result<Outcome, StoreError>;

    /// Count what is stored
    fn stats(&self) -> Result<GraphStats, StoreError>;
}
