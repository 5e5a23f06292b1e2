//! Git integration for listing, resolving and checking out commits.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::domain::CommitId;
use crate::vcs::{VcsError, VersionControl};

/// A git working copy driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Open the repository containing `dir`.
    ///
    /// Fails if `dir` is not inside a git work tree or git is not available.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, VcsError> {
        let dir = dir.as_ref();
        if !is_git_repo(dir) {
            return Err(VcsError::Command(format!(
                "{} is not inside a git work tree",
                dir.display()
            )));
        }
        Ok(Self {
            root: dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output, VcsError> {
        debug!(?args, "running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| VcsError::Command(format!("failed to run git: {e}")))
    }

    /// Run git and return trimmed stdout, mapping a non-zero exit to an error.
    fn git_stdout(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.git(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VcsError::Command(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Tracked-file changes as reported by `git status --porcelain`.
    fn tracked_changes(&self) -> Result<String, VcsError> {
        self.git_stdout(&["status", "--porcelain", "--untracked-files=no"])
    }
}

impl VersionControl for GitRepository {
    fn list_commits(&self, branch: &str) -> Result<Vec<CommitId>, VcsError> {
        let output = self.git(&["rev-list", branch, "--"])?;
        if !output.status.success() {
            return Err(VcsError::UnknownRevision(branch.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(CommitId::from)
            .collect())
    }

    fn resolve_commit(&self, id: &str) -> Result<CommitId, VcsError> {
        let spec = format!("{id}^{{commit}}");
        let output = self.git(&["rev-parse", "--verify", "--quiet", &spec])?;
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || sha.is_empty() {
            return Err(VcsError::UnknownRevision(id.to_string()));
        }
        Ok(CommitId::from(sha))
    }

    fn checkout(&self, rev: &str) -> Result<(), VcsError> {
        let changes = self.tracked_changes()?;
        if !changes.is_empty() {
            return Err(VcsError::DirtyWorkingTree(changes));
        }

        let output = self.git(&["checkout", "--quiet", rev])?;
        if !output.status.success() {
            return Err(VcsError::CheckoutFailed {
                rev: rev.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn current_branch(&self) -> Result<String, VcsError> {
        let branch = self.git_stdout(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch == "HEAD" {
            // detached: hand back the commit so it can be restored
            return capture_head_sha(&self.root);
        }
        Ok(branch)
    }
}

/// Capture the HEAD commit SHA from a git repository.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String, VcsError> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| VcsError::Command(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VcsError::Command(format!("git rev-parse HEAD failed: {stderr}")));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(VcsError::Command(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }

    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Repository on branch `main` with three commits touching `file.txt`.
    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "--quiet"]);
        run_git(dir.path(), &["checkout", "-q", "-b", "main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        for i in 1..=3 {
            std::fs::write(dir.path().join("file.txt"), format!("v{i}\n")).unwrap();
            run_git(dir.path(), &["add", "file.txt"]);
            run_git(dir.path(), &["commit", "-q", "-m", &format!("commit {i}")]);
        }
        dir
    }

    #[test]
    fn list_commits_is_newest_first() {
        let repo_dir = make_git_repo();
        let repo = GitRepository::open(repo_dir.path()).unwrap();

        let commits = repo.list_commits("main").unwrap();
        assert_eq!(commits.len(), 3);
        let head = capture_head_sha(repo_dir.path()).unwrap();
        assert_eq!(commits[0].as_str(), head);
    }

    #[test]
    fn list_commits_unknown_branch_fails() {
        let repo_dir = make_git_repo();
        let repo = GitRepository::open(repo_dir.path()).unwrap();
        assert!(matches!(
            repo.list_commits("no-such-branch"),
            Err(VcsError::UnknownRevision(_))
        ));
    }

    #[test]
    fn resolve_commit_expands_short_ids() {
        let repo_dir = make_git_repo();
        let repo = GitRepository::open(repo_dir.path()).unwrap();
        let head = capture_head_sha(repo_dir.path()).unwrap();

        let resolved = repo.resolve_commit(&head[..10]).unwrap();
        assert_eq!(resolved.as_str(), head);
        assert!(matches!(
            repo.resolve_commit("deadbeefdeadbeef"),
            Err(VcsError::UnknownRevision(_))
        ));
    }

    #[test]
    fn checkout_and_restore_branch() {
        let repo_dir = make_git_repo();
        let repo = GitRepository::open(repo_dir.path()).unwrap();
        let commits = repo.list_commits("main").unwrap();

        assert_eq!(repo.current_branch().unwrap(), "main");
        repo.checkout(commits[2].as_str()).unwrap();
        let content = std::fs::read_to_string(repo_dir.path().join("file.txt")).unwrap();
        assert_eq!(content, "v1\n");
        assert_eq!(repo.current_branch().unwrap(), commits[2].as_str());

        repo.checkout("main").unwrap();
        assert_eq!(repo.current_branch().unwrap(), "main");
    }

    #[test]
    fn checkout_refuses_dirty_tree() {
        let repo_dir = make_git_repo();
        let repo = GitRepository::open(repo_dir.path()).unwrap();
        let commits = repo.list_commits("main").unwrap();

        std::fs::write(repo_dir.path().join("file.txt"), "local edit\n").unwrap();
        let err = repo.checkout(commits[1].as_str()).unwrap_err();
        assert!(matches!(err, VcsError::DirtyWorkingTree(_)));
    }

    #[test]
    fn open_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GitRepository::open(dir.path()).is_err());
        assert!(!is_git_repo(dir.path()));
    }

    #[test]
    fn capture_head_sha_returns_40_hex_chars() {
        let repo = make_git_repo();
        let sha = capture_head_sha(repo.path()).unwrap();
        assert_eq!(sha.len(), 40, "SHA should be 40 hex chars, got: {sha}");
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
