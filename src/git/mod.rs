//! Reading commit history from git repositories
//!
//! Resolves a source location to a locked local working copy, cloning or
//! reusing it, and walks every reachable commit of that copy.

/// Exclusive per-repository lock on the working copy
pub mod lock;
/// Source location parsing and working copy acquisition
pub mod source;
/// Commit history walking
pub mod walker;

pub use lock::WorkingCopyLock;
pub use source::{Acquisition, ObtainOptions, SourceLocation, WorkingCopy, obtain};
pub use walker::{CommitIter, CommitRecord, HistoryWalker};
