use crate::error::HistoryError;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use git2::{Repository, Revwalk, Sort};

/// One entry of a repository's history, as recorded in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Full commit SHA hash (40 characters)
    pub hash: String,
    /// Author's email address, the author's identity
    pub author_email: String,
    /// Commit time in RFC 3339 with the committer's UTC offset
    pub timestamp: String,
}

impl CommitRecord {
    fn from_commit(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let author_email = String::from_utf8_lossy(author.email_bytes()).into_owned();

        Self {
            hash: commit.id().to_string(),
            author_email,
            timestamp: format_git_time(commit.committer().when()),
        }
    }
}

/// Render a git timestamp as RFC 3339, keeping its original offset
pub(crate) fn format_git_time(time: git2::Time) -> String {
    let utc = DateTime::<Utc>::from_timestamp(time.seconds(), 0).unwrap_or(DateTime::UNIX_EPOCH);
    match FixedOffset::east_opt(time.offset_minutes() * 60) {
        Some(offset) => utc
            .with_timezone(&offset)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        None => utc.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Walks every commit reachable from HEAD and all refs
pub struct HistoryWalker<'repo> {
    repo: &'repo Repository,
}

impl<'repo> HistoryWalker<'repo> {
    pub fn new(repo: &'repo Repository) -> Self {
        Self { repo }
    }

    /// Start a fresh, single-pass walk
    ///
    /// Order is topological with time as tie-breaker, stable for a given
    /// repository state. An empty repository yields no commits.
    pub fn commits(&self) -> Result<CommitIter<'repo>, HistoryError> {
        let mut revwalk = self.repo.revwalk().map_err(HistoryError::WalkFailed)?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(HistoryError::WalkFailed)?;

        // Unborn or missing HEAD is fine, refs may still point at history
        if self.repo.head().is_ok() {
            revwalk.push_head().map_err(HistoryError::WalkFailed)?;
        }
        // Non-commit targets (e.g. tags of trees) are skipped by libgit2
        revwalk
            .push_glob("refs/*")
            .map_err(HistoryError::WalkFailed)?;

        Ok(CommitIter {
            repo: self.repo,
            revwalk,
            yielded: 0,
        })
    }
}

/// Lazy iterator over [`CommitRecord`]s
pub struct CommitIter<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
    yielded: usize,
}

impl CommitIter<'_> {
    /// Number of commits produced so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for CommitIter<'_> {
    type Item = Result<CommitRecord, HistoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let oid = match self.revwalk.next()? {
            Ok(oid) => oid,
            Err(e) => return Some(Err(HistoryError::WalkFailed(e))),
        };

        let record = self
            .repo
            .find_commit(oid)
            .map(|commit| CommitRecord::from_commit(&commit))
            .map_err(|source| HistoryError::CommitLookup {
                hash: oid.to_string(),
                source,
            });

        if record.is_ok() {
            self.yielded += 1;
            if self.yielded % 500 == 0 {
                tracing::debug!("Walked {} commits", self.yielded);
            }
        }
        Some(record)
    }
}
