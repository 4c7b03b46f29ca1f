//! Stash plumbing
//!
//! Stash entries are tracked by commit id rather than by `stash@{n}`, since
//! the position of an entry shifts whenever anything else pushes or drops.

use git2::{ObjectType, Oid, TreeWalkMode, TreeWalkResult};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{GitError, GitRepo};

const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_SYMLINK: i32 = 0o120000;

/// A stash entry created by hookrun
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashHandle {
    pub oid: String,
    pub message: String,
}

impl StashHandle {
    /// Command that re-applies this entry by hand
    pub fn recovery_command(&self) -> String {
        format!("git stash apply {}", self.oid)
    }
}

impl fmt::Display for StashHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stash {} ({})", &self.oid[..self.oid.len().min(10)], self.message)
    }
}

/// An untracked file held in a stash entry
struct UntrackedFile {
    path: PathBuf,
    content: Vec<u8>,
    mode: i32,
}

impl UntrackedFile {
    fn write_to(&self, root: &Path) -> io::Result<()> {
        let target = root.join(&self.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        if self.mode == MODE_SYMLINK {
            use std::os::unix::ffi::OsStrExt;
            let link = std::ffi::OsStr::from_bytes(&self.content);
            return std::os::unix::fs::symlink(link, &target);
        }

        fs::write(&target, &self.content)?;

        #[cfg(unix)]
        if self.mode == MODE_EXECUTABLE {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&target)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&target, perms)?;
        }

        Ok(())
    }
}

impl GitRepo {
    /// Stash unstaged changes while leaving the index (and its content in the
    /// working tree) in place. Returns `None` when git had nothing to stash.
    pub fn stash_create(
        &self,
        include_untracked: bool,
        message: &str,
    ) -> Result<Option<StashHandle>, GitError> {
        let before = self.stash_top()?;

        let mut args = vec!["stash", "push", "--keep-index", "--quiet"];
        if include_untracked {
            args.push("--include-untracked");
        }
        args.extend(["--message", message]);
        self.git(&args)?;

        let after = self.stash_top()?;
        if after.is_none() || after == before {
            return Ok(None);
        }

        Ok(after.map(|oid| StashHandle {
            oid,
            message: message.to_string(),
        }))
    }

    /// Put the stashed changes back on top of whatever the steps left in
    /// the working tree. The entry is left in the stash list; see
    /// [`GitRepo::stash_drop`].
    ///
    /// Only the unstaged part is replayed: the diff between the entry's
    /// index and working tree commits is applied with `git apply`, which
    /// either applies completely or not at all. Untracked files are written
    /// back from the entry's third parent, and refused if a step created a
    /// file at the same path or at one of its parent directories. If the
    /// untracked files still cannot be written, the applied diff is
    /// reversed. On error the working tree is as the steps left it.
    pub fn stash_restore(&self, handle: &StashHandle) -> Result<(), GitError> {
        let untracked = self.stash_untracked_files(handle)?;
        if let Some(conflict) = untracked.iter().find_map(|f| self.blocked_path(&f.path)) {
            return Err(GitError::new(
                "restore untracked files",
                1,
                format!("{} was created while the stash was held", conflict.display()),
            ));
        }

        let index = format!("{}^2", handle.oid);
        let patch = self.git([
            "diff",
            "--binary",
            "--full-index",
            "--no-color",
            "--no-ext-diff",
            "--no-textconv",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            index.as_str(),
            handle.oid.as_str(),
        ])?;
        let patch = patch.stdout;
        if !patch.is_empty() {
            self.git_with_input(["apply", "--whitespace=nowarn", "-"], &patch)?;
        }

        let mut written: Vec<&Path> = Vec::with_capacity(untracked.len());
        for file in &untracked {
            if let Err(e) = file.write_to(&self.root) {
                let err = GitError::new(
                    "restore untracked files",
                    1,
                    format!("{}: {e}", file.path.display()),
                );
                self.undo_restore(&patch, &written);
                return Err(err);
            }
            written.push(&file.path);
        }

        Ok(())
    }

    /// First path at or above `relative` that a restore would clobber: an
    /// existing entry at the path itself, or a non-directory where a parent
    /// directory is needed
    fn blocked_path(&self, relative: &Path) -> Option<PathBuf> {
        if self.root.join(relative).symlink_metadata().is_ok() {
            return Some(relative.to_path_buf());
        }
        relative
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .find(|dir| {
                self.root
                    .join(dir)
                    .symlink_metadata()
                    .is_ok_and(|meta| !meta.is_dir())
            })
            .map(Path::to_path_buf)
    }

    /// Take back a partial restore so the stash entry still applies cleanly
    fn undo_restore(&self, patch: &[u8], written: &[&Path]) {
        for path in written {
            if let Err(e) = fs::remove_file(self.root.join(path)) {
                tracing::error!("could not remove restored {}: {}", path.display(), e);
            }
        }
        if !patch.is_empty() {
            let reverse = ["apply", "-R", "--whitespace=nowarn", "-"];
            if let Err(e) = self.git_with_input(reverse, patch) {
                tracing::error!("could not reverse the restored changes: {}", e);
            }
        }
    }

    /// Files stored in the entry's untracked-files commit, if it has one
    fn stash_untracked_files(&self, handle: &StashHandle) -> Result<Vec<UntrackedFile>, GitError> {
        let git2_err = |e| GitError::from_git2("read stash entry", e);

        let oid = Oid::from_str(&handle.oid).map_err(git2_err)?;
        let commit = self.repo.find_commit(oid).map_err(git2_err)?;
        if commit.parent_count() < 3 {
            return Ok(Vec::new());
        }
        let tree = commit.parent(2).and_then(|c| c.tree()).map_err(git2_err)?;

        let mut files = Vec::new();
        let mut failure = None;
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            let blob = match entry.to_object(&self.repo).and_then(|o| o.peel_to_blob()) {
                Ok(blob) => blob,
                Err(e) => {
                    failure = Some(e);
                    return TreeWalkResult::Abort;
                }
            };
            let Some(name) = entry.name() else {
                failure = Some(git2::Error::from_str("untracked file name is not valid UTF-8"));
                return TreeWalkResult::Abort;
            };
            files.push(UntrackedFile {
                path: PathBuf::from(dir).join(name),
                content: blob.content().to_vec(),
                mode: entry.filemode(),
            });
            TreeWalkResult::Ok
        })
        .map_err(git2_err)?;

        match failure {
            Some(e) => Err(git2_err(e)),
            None => Ok(files),
        }
    }

    /// Remove the entry from the stash list
    pub fn stash_drop(&self, handle: &StashHandle) -> Result<(), GitError> {
        let Some(reference) = self.stash_ref(handle)? else {
            return Err(GitError::new(
                "git stash drop",
                1,
                format!("{} is no longer in the stash list", handle.oid),
            ));
        };
        self.git(["stash", "drop", "--quiet", reference.as_str()])?;
        Ok(())
    }

    /// Current `stash@{n}` name of the entry, if it is still listed
    pub fn stash_ref(&self, handle: &StashHandle) -> Result<Option<String>, GitError> {
        let listing = self.git_stdout(["stash", "list", "--format=%H"])?;
        Ok(listing
            .lines()
            .position(|line| line.trim() == handle.oid)
            .map(|index| format!("stash@{{{index}}}")))
    }

    fn stash_top(&self) -> Result<Option<String>, GitError> {
        match self.git_stdout(["rev-parse", "--quiet", "--verify", "refs/stash"]) {
            Ok(oid) if !oid.is_empty() => Ok(Some(oid)),
            Ok(_) => Ok(None),
            // --verify --quiet exits 1 without output when there is no stash
            Err(err) if err.code == 1 => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use std::fs;

    #[test]
    fn test_nothing_to_stash() {
        let (_temp, repo) = init_repo();
        assert!(repo.stash_create(true, "hookrun test").unwrap().is_none());
    }

    #[test]
    fn test_stash_keeps_index_and_restores() {
        let (temp, repo) = init_repo();
        let dir = temp.path();

        fs::write(dir.join("staged.txt"), "staged\n").unwrap();
        git(dir, &["add", "staged.txt"]);
        fs::write(dir.join("README.md"), "unstaged edit\n").unwrap();
        fs::write(dir.join("scratch.txt"), "untracked\n").unwrap();

        let handle = repo.stash_create(true, "hookrun test").unwrap().unwrap();
        assert_eq!(repo.stash_ref(&handle).unwrap().as_deref(), Some("stash@{0}"));
        assert_eq!(fs::read_to_string(dir.join("README.md")).unwrap(), "hello\n");
        assert!(dir.join("staged.txt").exists());
        assert!(!dir.join("scratch.txt").exists());

        repo.stash_restore(&handle).unwrap();
        repo.stash_drop(&handle).unwrap();

        assert_eq!(fs::read_to_string(dir.join("README.md")).unwrap(), "unstaged edit\n");
        assert_eq!(fs::read_to_string(dir.join("scratch.txt")).unwrap(), "untracked\n");
        assert!(repo.stash_ref(&handle).unwrap().is_none());
        assert_eq!(repo.staged_files().unwrap(), vec![std::path::PathBuf::from("staged.txt")]);
    }

    #[test]
    fn test_blocked_parent_directory_refuses_before_applying() {
        let (temp, repo) = init_repo();
        let dir = temp.path();
        fs::write(dir.join("README.md"), "unstaged edit\n").unwrap();
        fs::create_dir_all(dir.join("gen/deep")).unwrap();
        fs::write(dir.join("gen/deep/notes.txt"), "untracked\n").unwrap();

        let handle = repo.stash_create(true, "hookrun test").unwrap().unwrap();
        fs::create_dir_all(dir.join("gen")).unwrap();
        fs::write(dir.join("gen/deep"), "file, not a dir\n").unwrap();

        let err = repo.stash_restore(&handle).unwrap_err();
        assert!(err.message.contains("gen/deep"), "{}", err.message);
        assert_eq!(fs::read_to_string(dir.join("README.md")).unwrap(), "hello\n");
        assert!(repo.stash_ref(&handle).unwrap().is_some());
    }

    #[test]
    fn test_recovery_command_uses_oid() {
        let handle = super::StashHandle {
            oid: "0123456789abcdef".into(),
            message: "m".into(),
        };
        assert_eq!(handle.recovery_command(), "git stash apply 0123456789abcdef");
    }
}
