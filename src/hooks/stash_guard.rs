//! Scoped isolation of unstaged changes
//!
//! [`StashGuard::begin`] sets unstaged (and optionally untracked) changes
//! aside in a single stash entry so steps only see what is staged.
//! [`StashGuard::end`] puts them back. If the guard is dropped without
//! `end` having been called (early return, `?`, panic unwind) the restore
//! runs from `Drop` instead, so it happens exactly once on every path.
//!
//! A restore that does not apply cleanly writes nothing and never discards
//! the entry: it stays in the stash list and the outcome names it together
//! with the command that recovers it.

use console::style;

use crate::error::HookrunError;
use crate::git::{GitError, GitRepo, StashHandle};

/// What happened to the stashed changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StashOutcome {
    /// Stashing was off or there was nothing to set aside
    NotStashed,
    /// Changes are back in the working tree and the entry was dropped
    Restored { handle: StashHandle },
    /// Changes are back in the working tree but the entry could not be
    /// dropped; it is harmless and can be removed by hand
    RestoredKept { handle: StashHandle, reason: String },
    /// Changes could not be applied; they remain in the stash entry
    Pending { handle: StashHandle, reason: String },
}

impl StashOutcome {
    /// Whether the user's work is back in the working tree
    pub fn is_restored(&self) -> bool {
        !matches!(self, StashOutcome::Pending { .. })
    }

    pub fn handle(&self) -> Option<&StashHandle> {
        match self {
            StashOutcome::NotStashed => None,
            StashOutcome::Restored { handle }
            | StashOutcome::RestoredKept { handle, .. }
            | StashOutcome::Pending { handle, .. } => Some(handle),
        }
    }

    /// The conflict as an error, for outcomes that left work in the stash
    pub fn to_error(&self) -> Option<HookrunError> {
        match self {
            StashOutcome::Pending { handle, .. } => Some(HookrunError::StashConflict {
                stash: handle.oid.clone(),
                recovery: handle.recovery_command(),
            }),
            _ => None,
        }
    }
}

pub struct StashGuard<'repo> {
    repo: &'repo GitRepo,
    handle: Option<StashHandle>,
}

impl<'repo> StashGuard<'repo> {
    /// Stash unstaged changes before any step runs. An error here means
    /// nothing was stashed and the hook must not run.
    pub fn begin(
        repo: &'repo GitRepo,
        include_untracked: bool,
        hook: &str,
    ) -> Result<Self, HookrunError> {
        let unmerged = repo.unmerged_files()?;
        if !unmerged.is_empty() {
            return Err(GitError::new(
                "git stash push",
                1,
                format!("{} unmerged path(s); resolve them before committing", unmerged.len()),
            )
            .into());
        }

        if repo.head()?.is_none() {
            tracing::warn!("HEAD is unborn, unstaged changes are not stashed");
            return Ok(Self::disabled(repo));
        }
        if !repo.status()?.has_unstaged_changes(include_untracked) {
            tracing::debug!("no unstaged changes to stash");
            return Ok(Self::disabled(repo));
        }

        let message = format!("hookrun: unstaged changes before {hook}");
        let handle = repo.stash_create(include_untracked, &message)?;
        if let Some(handle) = &handle {
            tracing::info!("stashed unstaged changes as {}", handle.oid);
        }

        Ok(Self { repo, handle })
    }

    /// Guard that stashes nothing, for hooks with stashing disabled
    pub fn disabled(repo: &'repo GitRepo) -> Self {
        Self { repo, handle: None }
    }

    pub fn handle(&self) -> Option<&StashHandle> {
        self.handle.as_ref()
    }

    /// Restore the stashed changes. Consumes the guard; `Drop` will not
    /// restore a second time.
    pub fn end(mut self) -> StashOutcome {
        self.restore()
    }

    fn restore(&mut self) -> StashOutcome {
        let Some(handle) = self.handle.take() else {
            return StashOutcome::NotStashed;
        };

        match self.repo.stash_restore(&handle) {
            Ok(()) => match self.repo.stash_drop(&handle) {
                Ok(()) => {
                    tracing::info!("restored unstaged changes from {}", handle.oid);
                    StashOutcome::Restored { handle }
                }
                Err(err) => {
                    tracing::warn!("restored {} but could not drop it: {}", handle.oid, err);
                    StashOutcome::RestoredKept {
                        handle,
                        reason: err.message,
                    }
                }
            },
            Err(err) => {
                tracing::error!("could not restore {}: {}", handle.oid, err);
                StashOutcome::Pending {
                    handle,
                    reason: err.message,
                }
            }
        }
    }
}

impl Drop for StashGuard<'_> {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }

        tracing::warn!("hook run ended early, restoring stashed changes");
        let outcome = self.restore();
        match &outcome {
            StashOutcome::Pending { handle, reason } => {
                eprintln!(
                    "{} unstaged changes could not be restored ({})\n  they are kept in {}\n  recover with: {}",
                    style("✖").red().bold(),
                    reason,
                    handle,
                    style(handle.recovery_command()).bold()
                );
            }
            StashOutcome::RestoredKept { handle, .. } => {
                eprintln!(
                    "{} unstaged changes restored; {} is still listed and can be dropped",
                    style("⚠").yellow(),
                    handle
                );
            }
            _ => {}
        }
    }
}
