//! Scoped checkout of the project under test.
//!
//! [`CheckoutGuard`] remembers the branch that was checked out when it was
//! acquired and puts it back when the run ends. Call [`CheckoutGuard::restore`]
//! to observe restore failures; if the guard is dropped instead (early return,
//! panic, cancelled future) it restores on drop and logs any failure.

use perfdelta_core::obs;
use perfdelta_core::{CommitId, VcsError, VersionControl};
use tracing::debug;

pub struct CheckoutGuard<'a> {
    vcs: &'a dyn VersionControl,
    original: String,
    restored: bool,
}

impl<'a> CheckoutGuard<'a> {
    /// Record the current branch. Nothing is checked out yet.
    pub fn acquire(vcs: &'a dyn VersionControl) -> Result<Self, VcsError> {
        let original = vcs.current_branch()?;
        debug!(branch = %original, "recorded original checkout");
        Ok(Self {
            vcs,
            original,
            restored: false,
        })
    }

    /// Branch (or detached sha) that will be restored.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn checkout(&self, commit: &CommitId) -> Result<(), VcsError> {
        self.vcs.checkout(commit.as_str())
    }

    /// Check the original branch back out.
    pub fn restore(mut self) -> Result<(), VcsError> {
        self.restored = true;
        self.vcs.checkout(&self.original)
    }
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.vcs.checkout(&self.original) {
            obs::emit_restore_error(&self.original, &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeVcs;

    #[test]
    fn restore_returns_to_original_branch() {
        let vcs = FakeVcs::new("main", &["c2", "c1"]);
        let guard = CheckoutGuard::acquire(&vcs).unwrap();
        guard.checkout(&CommitId::from("c1")).unwrap();
        assert_eq!(vcs.head(), "c1");

        guard.restore().unwrap();
        assert_eq!(vcs.head(), "main");
        assert_eq!(vcs.checkouts(), vec!["c1", "main"]);
    }

    #[test]
    fn drop_restores_once() {
        let vcs = FakeVcs::new("main", &["c2", "c1"]);
        {
            let guard = CheckoutGuard::acquire(&vcs).unwrap();
            guard.checkout(&CommitId::from("c2")).unwrap();
        }
        assert_eq!(vcs.head(), "main");
        assert_eq!(vcs.checkouts(), vec!["c2", "main"]);
    }

    #[test]
    fn explicit_restore_is_not_repeated_on_drop() {
        let vcs = FakeVcs::new("main", &["c1"]);
        let guard = CheckoutGuard::acquire(&vcs).unwrap();
        assert_eq!(guard.original(), "main");
        guard.restore().unwrap();
        assert_eq!(vcs.checkouts(), vec!["main"]);
    }

    #[test]
    fn failed_restore_is_reported() {
        let vcs = FakeVcs::new("main", &["c1"]).failing_checkout("main");
        let guard = CheckoutGuard::acquire(&vcs).unwrap();
        guard.checkout(&CommitId::from("c1")).unwrap();
        assert!(matches!(
            guard.restore(),
            Err(VcsError::CheckoutFailed { .. })
        ));
        assert_eq!(vcs.head(), "c1");
    }
}
