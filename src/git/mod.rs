//! Git integration layer for hookrun
//!
//! Repository discovery and status go through git2. Everything that mutates
//! the repository (stash, add, commit) shells out to the `git` binary so the
//! user's own git configuration applies, and every non-zero exit is surfaced
//! as a [`GitError`] carrying git's code and stderr verbatim.

pub mod operations;
pub mod stash;

use git2::Repository;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::io::Write;
use std::process::{Command, Output, Stdio};
use thiserror::Error;

pub use operations::WorkingTreeState;
pub use stash::StashHandle;

/// A failed git invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{command}` failed with exit code {code}: {message}")]
pub struct GitError {
    pub command: String,
    pub code: i32,
    pub message: String,
}

impl GitError {
    pub fn new(command: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            code,
            message: message.into(),
        }
    }

    pub(crate) fn from_git2(operation: &str, err: git2::Error) -> Self {
        Self::new(operation, err.raw_code(), err.message())
    }

    /// Process exit code for this failure; libgit2's negative codes map to 1.
    pub fn exit_code(&self) -> i32 {
        if self.code > 0 { self.code } else { 1 }
    }
}

/// Object id of a commit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CommitId {
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl GitRepo {
    /// Discover the repository containing the current directory
    pub fn discover() -> Result<Self, GitError> {
        Self::open(".")
    }

    /// Discover the repository containing `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let repo = Repository::discover(path.as_ref())
            .map_err(|e| GitError::from_git2("discover repository", e))?;
        let root = repo
            .workdir()
            .ok_or_else(|| {
                GitError::new("discover repository", 1, "repository has no working directory")
            })?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Working tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.git` directory
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Directory git runs hooks from, honouring `core.hooksPath`
    pub fn hooks_dir(&self) -> Result<PathBuf, GitError> {
        let path = PathBuf::from(self.git_stdout(["rev-parse", "--git-path", "hooks"])?);
        Ok(if path.is_absolute() { path } else { self.root.join(path) })
    }

    pub fn current_branch(&self) -> Result<String, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2("resolve HEAD", e))?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    /// Commit HEAD points at, `None` while the branch is unborn
    pub fn head(&self) -> Result<Option<CommitId>, GitError> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2("resolve HEAD", e))?;
                Ok(Some(CommitId(commit.id().to_string())))
            }
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(GitError::from_git2("resolve HEAD", e)),
        }
    }

    /// Blob id of a working tree file as git would hash it, `None` if absent
    pub fn hash_file(&self, relative: &Path) -> Option<String> {
        let path = self.root.join(relative);
        if !path.is_file() {
            return None;
        }
        git2::Oid::hash_file(git2::ObjectType::Blob, &path)
            .ok()
            .map(|oid| oid.to_string())
    }

    /// Run git in the repository root; non-zero exit becomes a [`GitError`]
    pub(crate) fn git<I, S>(&self, args: I) -> Result<Output, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command_line = describe(&args);
        tracing::debug!("running {}", command_line);

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| GitError::new(&command_line, 127, format!("failed to execute git: {e}")))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            tracing::debug!("{} exited with {}: {}", command_line, code, stderr);
            return Err(GitError::new(command_line, code, stderr));
        }

        Ok(output)
    }

    /// Run git with `input` on stdin
    pub(crate) fn git_with_input<I, S>(&self, args: I, input: &[u8]) -> Result<Output, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command_line = describe(&args);
        tracing::debug!("running {} ({} bytes on stdin)", command_line, input.len());
        let spawn_error = |e: std::io::Error| {
            GitError::new(&command_line, 127, format!("failed to execute git: {e}"))
        };

        let mut child = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).map_err(spawn_error)?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            tracing::debug!("{} exited with {}: {}", command_line, code, stderr);
            return Err(GitError::new(command_line, code, stderr));
        }

        Ok(output)
    }

    /// Run git and return trimmed stdout
    pub(crate) fn git_stdout<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.git(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

fn describe(args: &[std::ffi::OsString]) -> String {
    let mut command_line = String::from("git");
    for arg in args {
        command_line.push(' ');
        command_line.push_str(&arg.to_string_lossy());
    }
    command_line
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::GitRepo;
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    pub fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    /// Fresh repository with one commit containing `README.md`
    pub fn init_repo() -> (TempDir, GitRepo) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        git(dir, &["init", "-q", "-b", "main"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        git(dir, &["add", "README.md"]);
        git(dir, &["commit", "-q", "-m", "initial"]);
        let repo = GitRepo::open(dir).unwrap();
        (temp, repo)
    }
}
