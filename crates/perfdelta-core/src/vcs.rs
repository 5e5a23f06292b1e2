//! Version-control seam used by the pipeline.
//!
//! The pipeline only needs four operations from the repository under test.
//! [`crate::git::GitRepository`] implements them on top of the `git` binary.

use crate::domain::CommitId;

/// Errors reported by a [`VersionControl`] backend.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("working tree has uncommitted changes:\n{0}")]
    DirtyWorkingTree(String),

    #[error("checkout of {rev} failed: {message}")]
    CheckoutFailed { rev: String, message: String },

    #[error("git command failed: {0}")]
    Command(String),
}

/// Read and move the working copy of the project under test.
///
/// Implementations are used strictly sequentially; `Sync` is only required so
/// a shared reference can be held across `.await` points.
pub trait VersionControl: Send + Sync {
    /// Commits reachable from `branch`, newest first.
    fn list_commits(&self, branch: &str) -> Result<Vec<CommitId>, VcsError>;

    /// Resolve a (possibly abbreviated) id or ref to a full commit id.
    fn resolve_commit(&self, id: &str) -> Result<CommitId, VcsError>;

    /// Check out a commit or branch. Fails on a dirty working tree.
    fn checkout(&self, rev: &str) -> Result<(), VcsError>;

    /// The branch currently checked out.
    fn current_branch(&self) -> Result<String, VcsError>;
}
