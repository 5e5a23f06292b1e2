//! Resolution of a commit selection into an ordered commit list.

use perfdelta_core::{CommitId, VcsError, VersionControl};
use serde::{Deserialize, Serialize};

/// Which commits to test. Every variant resolves newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommitSelection {
    /// All commits of the branch from `start` (newer) down to `end` (older),
    /// both inclusive.
    Range { start: String, end: String },

    /// Exactly these commits, in the given order.
    List { ids: Vec<String> },

    /// The `count` newest commits of the branch.
    Latest { count: usize },
}

/// Why a selection could not be resolved. Raised before any checkout.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("cannot resolve commit {id}: {source}")]
    Unresolved {
        id: String,
        #[source]
        source: VcsError,
    },

    #[error("cannot list commits of branch {branch}: {source}")]
    History {
        branch: String,
        #[source]
        source: VcsError,
    },

    #[error("commit {commit} is not on branch {branch}")]
    NotOnBranch { commit: CommitId, branch: String },

    #[error("range start {start} must be newer than range end {end} on branch {branch}")]
    Order {
        start: CommitId,
        end: CommitId,
        branch: String,
    },

    #[error("commit selection is empty")]
    Empty,
}

impl CommitSelection {
    /// Resolve against `branch` of `vcs`.
    pub fn resolve(
        &self,
        vcs: &dyn VersionControl,
        branch: &str,
    ) -> Result<Vec<CommitId>, SelectionError> {
        match self {
            CommitSelection::Range { start, end } => resolve_range(vcs, branch, start, end),
            CommitSelection::List { ids } => {
                if ids.is_empty() {
                    return Err(SelectionError::Empty);
                }
                ids.iter().map(|id| resolve_one(vcs, id)).collect()
            }
            CommitSelection::Latest { count } => {
                let commits: Vec<CommitId> =
                    history(vcs, branch)?.into_iter().take(*count).collect();
                if commits.is_empty() {
                    return Err(SelectionError::Empty);
                }
                Ok(commits)
            }
        }
    }
}

fn resolve_one(vcs: &dyn VersionControl, id: &str) -> Result<CommitId, SelectionError> {
    vcs.resolve_commit(id)
        .map_err(|source| SelectionError::Unresolved {
            id: id.to_string(),
            source,
        })
}

fn history(vcs: &dyn VersionControl, branch: &str) -> Result<Vec<CommitId>, SelectionError> {
    vcs.list_commits(branch)
        .map_err(|source| SelectionError::History {
            branch: branch.to_string(),
            source,
        })
}

fn resolve_range(
    vcs: &dyn VersionControl,
    branch: &str,
    start: &str,
    end: &str,
) -> Result<Vec<CommitId>, SelectionError> {
    let start = resolve_one(vcs, start)?;
    let end = resolve_one(vcs, end)?;
    let commits = history(vcs, branch)?;

    let position = |commit: &CommitId| {
        commits
            .iter()
            .position(|c| c == commit)
            .ok_or_else(|| SelectionError::NotOnBranch {
                commit: commit.clone(),
                branch: branch.to_string(),
            })
    };
    let start_idx = position(&start)?;
    let end_idx = position(&end)?;

    if start_idx >= end_idx {
        return Err(SelectionError::Order {
            start,
            end,
            branch: branch.to_string(),
        });
    }
    Ok(commits[start_idx..=end_idx].to_vec())
}
