use git2::{Status, StatusOptions};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{CommitId, GitError, GitRepo};

/// Snapshot of `git status`, paths relative to the repository root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeState {
    pub staged: Vec<PathBuf>,
    pub unstaged: Vec<PathBuf>,
    pub untracked: Vec<PathBuf>,
    pub conflicted: Vec<PathBuf>,
}

impl WorkingTreeState {
    /// Whether there is anything a stash would need to set aside
    pub fn has_unstaged_changes(&self, include_untracked: bool) -> bool {
        !self.unstaged.is_empty() || (include_untracked && !self.untracked.is_empty())
    }

    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
    }
}

impl GitRepo {
    pub fn status(&self) -> Result<WorkingTreeState, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_ignored(false);
        opts.include_untracked(true);
        opts.recurse_untracked_dirs(true);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::from_git2("status", e))?;

        let mut state = WorkingTreeState::default();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else { continue };
            let path = PathBuf::from(path);
            let status = entry.status();

            if status.contains(Status::CONFLICTED) {
                state.conflicted.push(path);
                continue;
            }
            if status.intersects(
                Status::INDEX_NEW
                    | Status::INDEX_MODIFIED
                    | Status::INDEX_DELETED
                    | Status::INDEX_RENAMED
                    | Status::INDEX_TYPECHANGE,
            ) {
                state.staged.push(path.clone());
            }
            if status.contains(Status::WT_NEW) {
                state.untracked.push(path);
            } else if status.intersects(
                Status::WT_MODIFIED
                    | Status::WT_DELETED
                    | Status::WT_RENAMED
                    | Status::WT_TYPECHANGE,
            ) {
                state.unstaged.push(path);
            }
        }

        Ok(state)
    }

    /// Files staged for commit that still exist (added, copied, modified, renamed)
    pub fn staged_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let output = self.git(["diff", "--cached", "--name-only", "-z", "--diff-filter=ACMR"])?;
        Ok(split_nul(&output.stdout))
    }

    /// Every file tracked in the index
    pub fn tracked_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let output = self.git(["ls-files", "-z"])?;
        Ok(split_nul(&output.stdout))
    }

    /// Paths with unresolved merge conflicts
    pub fn unmerged_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let output = self.git(["diff", "--name-only", "-z", "--diff-filter=U"])?;
        Ok(split_nul(&output.stdout))
    }

    /// Patch of index against HEAD
    pub fn diff_staged(&self) -> Result<String, GitError> {
        self.git_stdout(["diff", "--cached", "--binary", "--no-color", "--no-ext-diff"])
    }

    /// Patch of working tree against index
    pub fn diff_unstaged(&self) -> Result<String, GitError> {
        self.git_stdout(["diff", "--binary", "--no-color", "--no-ext-diff"])
    }

    pub fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["add".into(), "--".into()];
        args.extend(paths.iter().map(|p| p.as_ref().as_os_str().to_os_string()));
        self.git(args)?;
        Ok(())
    }

    /// Commit the index. Installed hooks are bypassed because hookrun has
    /// already run them itself.
    pub fn commit(&self, message: &str) -> Result<CommitId, GitError> {
        self.git(["commit", "--no-verify", "--quiet", "--cleanup=whitespace", "-m", message])?;
        let sha = self.git_stdout(["rev-parse", "HEAD"])?;
        Ok(CommitId(sha))
    }
}

fn split_nul(stdout: &[u8]) -> Vec<PathBuf> {
    stdout
        .split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| PathBuf::from(String::from_utf8_lossy(chunk).into_owned()))
        .collect()
}
