//! Embedded graph store on SQLite
//!
//! Nodes and edges live in two tables keyed by `(label, key)`. Constraints
//! are partial unique indexes, one per label, named after the constraint.

use super::{
    COMMIT_LABEL, CommitLink, Constraint, GraphStats, GraphStore, NodeLabel, Outcome, Statement,
};
use crate::error::StoreError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL,
    key TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_label_key ON nodes(label, key);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL,
    key TEXT NOT NULL,
    source_id INTEGER NOT NULL REFERENCES nodes(id),
    target_id INTEGER NOT NULL REFERENCES nodes(id),
    properties TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_edges_label_key ON edges(label, key);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
";

const MERGE_NODE: &str = "
INSERT INTO nodes (label, key)
SELECT ?1, ?2
WHERE NOT EXISTS (SELECT 1 FROM nodes WHERE label = ?1 AND key = ?2)
ON CONFLICT DO NOTHING";

// Match-based: inserts nothing unless both endpoints exist
const MERGE_COMMIT: &str = "
INSERT INTO edges (label, key, source_id, target_id, properties)
SELECT ?1, ?2, author.id, repository.id, ?3
FROM nodes AS author, nodes AS repository
WHERE author.label = ?4 AND author.key = ?5
  AND repository.label = ?6 AND repository.key = ?7
  AND NOT EXISTS (SELECT 1 FROM edges WHERE label = ?1 AND key = ?2)
ON CONFLICT DO NOTHING";

/// Properties stored on a COMMIT edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitProperties {
    pub hash: String,
    pub timestamp: String,
}

/// Parsed `--graph-uri`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphUri {
    /// Private in-memory database, gone when the store is dropped
    Memory,
    /// Database file
    File(PathBuf),
}

impl GraphUri {
    /// Accepts `sqlite://<path>`, `sqlite::memory:`, `file:<path>` or a bare path
    pub fn parse(uri: &str) -> Result<Self, StoreError> {
        let uri = uri.trim();
        let connection_failed = |reason: &str| StoreError::ConnectionFailed {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        if uri.is_empty() {
            return Err(connection_failed("empty connection string"));
        }
        if uri == "sqlite::memory:" || uri == "sqlite://:memory:" || uri == ":memory:" {
            return Ok(GraphUri::Memory);
        }

        let path = if let Some(path) = uri.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = uri.strip_prefix("file://") {
            path
        } else if let Some(path) = uri.strip_prefix("file:") {
            path
        } else if let Some((scheme, _)) = uri.split_once("://") {
            return Err(StoreError::UnsupportedScheme(scheme.to_string()));
        } else {
            uri
        };

        if path.is_empty() {
            return Err(connection_failed("missing database path"));
        }
        Ok(GraphUri::File(PathBuf::from(path)))
    }
}

/// [`GraphStore`] backed by a single SQLite connection
pub struct SqliteGraphStore {
    conn: Connection,
}

impl SqliteGraphStore {
    /// Open (creating if needed) the store named by `uri`
    pub fn open(uri: &str, busy_timeout: Duration) -> Result<Self, StoreError> {
        let connection_failed = |reason: String| StoreError::ConnectionFailed {
            uri: uri.to_string(),
            reason,
        };

        let conn = match GraphUri::parse(uri)? {
            GraphUri::Memory => Connection::open_in_memory(),
            GraphUri::File(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| connection_failed(e.to_string()))?;
                }
                Connection::open(&path)
            }
        }
        .map_err(|e| connection_failed(e.to_string()))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| connection_failed(e.to_string()))?;

        tracing::debug!("Opened graph store {}", uri);
        Self::from_connection(conn)
    }

    /// Private in-memory store, mainly for tests and benchmarks
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn constraint_exists(&self, constraint: Constraint) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![constraint.name()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn declare_constraint(&self, constraint: Constraint) -> Result<Outcome, StoreError> {
        if self.constraint_exists(constraint)? {
            return Ok(Outcome::ConstraintExists);
        }

        // Labels are fixed identifiers, never user input
        let sql = match constraint {
            Constraint::RepositoryId => format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON nodes(key) WHERE label = '{}'",
                constraint.name(),
                NodeLabel::Repository
            ),
            Constraint::AuthorId => format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON nodes(key) WHERE label = '{}'",
                constraint.name(),
                NodeLabel::Author
            ),
            Constraint::CommitHash => format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON edges(key) WHERE label = '{}'",
                constraint.name(),
                COMMIT_LABEL
            ),
        };
        self.conn.execute_batch(&sql)?;
        Ok(Outcome::Created)
    }

    fn merge_node(&self, label: NodeLabel, key: &str) -> Result<Outcome, StoreError> {
        let inserted = self.conn.execute(MERGE_NODE, params![label.as_str(), key])?;
        Ok(if inserted > 0 {
            Outcome::Created
        } else {
            Outcome::Matched
        })
    }

    fn merge_commit(&self, link: CommitLink<'_>) -> Result<Outcome, StoreError> {
        let properties = serde_json::to_string(&CommitProperties {
            hash: link.hash.to_string(),
            timestamp: link.timestamp.to_string(),
        })?;

        let inserted = self.conn.execute(
            MERGE_COMMIT,
            params![
                COMMIT_LABEL,
                link.hash,
                properties,
                NodeLabel::Author.as_str(),
                link.author_email,
                NodeLabel::Repository.as_str(),
                link.repository_id,
            ],
        )?;
        if inserted > 0 {
            return Ok(Outcome::Created);
        }

        if self.commit_properties(link.hash)?.is_some() {
            Ok(Outcome::Matched)
        } else {
            Err(StoreError::MissingEndpoint {
                hash: link.hash.to_string(),
                author: link.author_email.to_string(),
                repository: link.repository_id.to_string(),
            })
        }
    }

    /// Properties of the COMMIT edge with `hash`, if recorded
    pub fn commit_properties(&self, hash: &str) -> Result<Option<CommitProperties>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT properties FROM edges WHERE label = ?1 AND key = ?2",
                params![COMMIT_LABEL, hash],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    fn count(&self, sql: &str, label: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(sql, params![label], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl GraphStore for SqliteGraphStore {
    fn execute(&mut self, statement: Statement<'_>) -> Result<Outcome, StoreError> {
        match statement {
            Statement::DeclareConstraint(constraint) => self.declare_constraint(constraint),
            Statement::MergeRepository { id } => self.merge_node(NodeLabel::Repository, id),
            Statement::MergeAuthor { email } => self.merge_node(NodeLabel::Author, email),
            Statement::MergeCommit(link) => self.merge_commit(link),
        }
    }

    fn stats(&self) -> Result<GraphStats, StoreError> {
        let count_nodes = "SELECT COUNT(*) FROM nodes WHERE label = ?1";

        let mut stmt = self.conn.prepare(
            "SELECT author.key, COUNT(*)
             FROM edges JOIN nodes AS author ON author.id = edges.source_id
             WHERE edges.label = ?1
             GROUP BY author.key
             ORDER BY author.key",
        )?;
        let commits_by_author = stmt
            .query_map(params![COMMIT_LABEL], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GraphStats {
            repositories: self.count(count_nodes, NodeLabel::Repository.as_str())?,
            authors: self.count(count_nodes, NodeLabel::Author.as_str())?,
            commits: self.count("SELECT COUNT(*) FROM edges WHERE label = ?1", COMMIT_LABEL)?,
            commits_by_author,
        })
    }
}

#[cfg(test)]
mod tests;
