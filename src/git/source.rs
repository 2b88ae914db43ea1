//! Obtaining a local working copy of a source repository
//!
//! A source location resolves to a stable repository identity and to one
//! working copy directory under the configured root. The first run clones
//! into it; later runs reuse it, optionally fetching so the walk sees the
//! remote's current history.

use crate::error::{AcquisitionError, HistoryError};
use crate::git::lock::{WorkingCopyLock, identity_digest};
use crate::git::walker::{CommitIter, HistoryWalker};
use git2::build::RepoBuilder;
use git2::{FetchOptions, RemoteCallbacks, Repository};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;

const REFRESH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// A parsed source location and the identity derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// What to hand to git when cloning
    clone_url: String,
    /// Stable identifier of the Repository node
    repository_id: String,
}

impl SourceLocation {
    /// Parse a URL, scp-like address (`git@host:owner/repo.git`) or local path
    ///
    /// The identity is the location's path with surrounding slashes and a
    /// trailing `.git` removed, so `https://host/acme/myrepo.git` becomes
    /// `acme/myrepo`.
    pub fn parse(location: &str) -> Result<Self, AcquisitionError> {
        let location = location.trim();
        let invalid = |reason: &str| AcquisitionError::InvalidSource {
            location: location.to_string(),
            reason: reason.to_string(),
        };

        if location.is_empty() {
            return Err(invalid("empty source location"));
        }

        let (clone_url, path) = match url::Url::parse(location) {
            // Single-letter schemes are Windows drive letters, not URLs
            Ok(url) if url.scheme().len() > 1 && !url.cannot_be_a_base() => {
                (location.to_string(), url.path().to_string())
            }
            _ => match scp_like_path(location) {
                Some(path) => (location.to_string(), path.to_string()),
                None => {
                    let local = Path::new(location);
                    let local = fs::canonicalize(local).unwrap_or_else(|_| local.to_path_buf());
                    let path = local
                        .components()
                        .filter_map(|c| match c {
                            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                            Component::ParentDir => Some("..".to_string()),
                            Component::CurDir => Some(".".to_string()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("/");
                    (local.to_string_lossy().into_owned(), path)
                }
            },
        };

        let repository_id = repository_id_from_path(&path).map_err(invalid)?;

        Ok(Self {
            clone_url,
            repository_id,
        })
    }

    pub fn clone_url(&self) -> &str {
        &self.clone_url
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// Working copy directory for this location under `workdir`
    ///
    /// One flat directory per identity, `{last segment}-{digest}`, so an
    /// identity that is a prefix of another (`acme`, `acme/r`) never nests.
    pub fn working_copy(&self, workdir: &Path) -> PathBuf {
        let name = self
            .repository_id
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository_id);
        workdir.join(format!(
            "{}-{}",
            name,
            identity_digest(&self.repository_id)
        ))
    }
}

/// `user@host:path` without a scheme, as accepted by git
fn scp_like_path(location: &str) -> Option<&str> {
    let (host, path) = location.split_once(':')?;
    if host.is_empty() || host.contains('/') || path.starts_with("//") {
        return None;
    }
    // A bare "c:" is a drive letter
    if host.len() == 1 && !host.contains('@') {
        return None;
    }
    Some(path)
}

fn repository_id_from_path(path: &str) -> Result<String, &'static str> {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err("relative path segments are not allowed");
    }

    let mut segments = segments;
    if let Some(last) = segments.pop() {
        let last = last.strip_suffix(".git").unwrap_or(last);
        if !last.is_empty() {
            segments.push(last);
        }
    }

    if segments.is_empty() {
        return Err("empty repository path");
    }

    Ok(segments.join("/"))
}

/// Options controlling acquisition
#[derive(Debug, Clone)]
pub struct ObtainOptions {
    /// Root directory holding working copies
    pub workdir: PathBuf,
    /// Fetch from origin when an existing working copy is reused
    pub refresh_existing: bool,
}

/// How the working copy was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Cloned,
    Reused,
    Refreshed,
}

/// An opened, locked working copy
pub struct WorkingCopy {
    repo: Repository,
    path: PathBuf,
    repository_id: String,
    acquisition: Acquisition,
    _lock: WorkingCopyLock,
}

impl std::fmt::Debug for WorkingCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingCopy")
            .field("path", &self.path)
            .field("repository_id", &self.repository_id)
            .field("acquisition", &self.acquisition)
            .finish_non_exhaustive()
    }
}

impl WorkingCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn acquisition(&self) -> Acquisition {
        self.acquisition
    }

    /// Start walking the working copy's full history
    pub fn commits(&self) -> Result<CommitIter<'_>, HistoryError> {
        HistoryWalker::new(&self.repo).commits()
    }
}

/// Clone `location` into its working copy, or reuse the copy already there
///
/// `cancel` is only honoured here: before starting and while objects are
/// being transferred.
pub fn obtain(
    location: &SourceLocation,
    options: &ObtainOptions,
    cancel: &CancellationToken,
) -> Result<WorkingCopy, AcquisitionError> {
    if cancel.is_cancelled() {
        return Err(AcquisitionError::Cancelled);
    }

    let path = location.working_copy(&options.workdir);
    let path_str = path.display().to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AcquisitionError::WorkdirCreation {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let lock = WorkingCopyLock::try_acquire(&options.workdir, location.repository_id())
        .map_err(|source| AcquisitionError::LockFailed {
            path: path_str.clone(),
            source,
        })?
        .ok_or_else(|| AcquisitionError::Locked(path_str.clone()))?;

    if path.exists() {
        match Repository::open(&path) {
            Ok(repo) => {
                warn_on_origin_mismatch(&repo, location);
                let acquisition = if options.refresh_existing {
                    refresh(&repo, &path, cancel)?;
                    Acquisition::Refreshed
                } else {
                    Acquisition::Reused
                };
                tracing::info!("Reusing working copy at {}", path.display());
                return Ok(WorkingCopy {
                    repo,
                    path,
                    repository_id: location.repository_id().to_string(),
                    acquisition,
                    _lock: lock,
                });
            }
            // Looks like a repository but libgit2 cannot read it
            Err(source) if path.join(".git").exists() => {
                return Err(AcquisitionError::OpenFailed {
                    path: path_str,
                    source,
                });
            }
            Err(e) if !is_empty_dir(&path) => {
                tracing::debug!("Existing path is not a repository: {}", e);
                return Err(AcquisitionError::OccupiedWorkdir(path_str));
            }
            Err(_) => {}
        }
    }

    tracing::info!(
        "Cloning {} into {}",
        location.clone_url(),
        path.display()
    );
    let repo = clone(location.clone_url(), &path, cancel)?;

    Ok(WorkingCopy {
        repo,
        path,
        repository_id: location.repository_id().to_string(),
        acquisition: Acquisition::Cloned,
        _lock: lock,
    })
}

fn fetch_options(cancel: &CancellationToken) -> FetchOptions<'static> {
    let cancel = cancel.clone();
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |progress| {
        let received = progress.received_objects();
        let total = progress.total_objects();
        if received == total || received % 1000 == 0 {
            tracing::debug!(
                "Received {}/{} objects ({} bytes)",
                received,
                total,
                progress.received_bytes()
            );
        }
        // Returning false aborts the transfer
        !cancel.is_cancelled()
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    fetch
}

fn clone(url: &str, path: &Path, cancel: &CancellationToken) -> Result<Repository, AcquisitionError> {
    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options(cancel));

    match builder.clone(url, path) {
        Ok(repo) => Ok(repo),
        Err(source) => {
            // Leave nothing behind that the next run would mistake for a copy
            if path.exists()
                && let Err(e) = fs::remove_dir_all(path)
            {
                tracing::warn!(
                    "Failed to clean up partial clone at {}: {}",
                    path.display(),
                    e
                );
            }
            if cancel.is_cancelled() {
                Err(AcquisitionError::Cancelled)
            } else {
                Err(AcquisitionError::CloneFailed {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }
}

fn refresh(repo: &Repository, path: &Path, cancel: &CancellationToken) -> Result<(), AcquisitionError> {
    let fetch_failed = |source| AcquisitionError::FetchFailed {
        path: path.display().to_string(),
        source,
    };

    prune_non_commit_tags(repo).map_err(fetch_failed)?;

    let mut remote = repo.find_remote("origin").map_err(fetch_failed)?;
    let mut options = fetch_options(cancel);

    tracing::debug!("Fetching origin into {}", path.display());
    match remote.fetch(&[REFRESH_REFSPEC], Some(&mut options), None) {
        Ok(()) => Ok(()),
        Err(_) if cancel.is_cancelled() => Err(AcquisitionError::Cancelled),
        Err(source) => Err(fetch_failed(source)),
    }
}

/// Delete local tags that do not lead to a commit
///
/// libgit2 refuses to fetch into a repository holding tags on trees or blobs
/// ("object is not a committish"). Such tags add nothing to the walk.
fn prune_non_commit_tags(repo: &Repository) -> Result<(), git2::Error> {
    let mut doomed = Vec::new();
    for reference in repo.references_glob("refs/tags/*")? {
        let reference = reference?;
        if reference.peel_to_commit().is_err()
            && let Some(name) = reference.name()
        {
            doomed.push(name.to_string());
        }
    }

    for name in doomed {
        tracing::debug!("Removing tag {} that does not point at a commit", name);
        repo.find_reference(&name)?.delete()?;
    }
    Ok(())
}

fn warn_on_origin_mismatch(repo: &Repository, location: &SourceLocation) {
    if let Ok(remote) = repo.find_remote("origin")
        && let Some(url) = remote.url()
        && url != location.clone_url()
    {
        tracing::warn!(
            "Working copy for {} was cloned from {}, not {}",
            location.repository_id(),
            url,
            location.clone_url()
        );
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
