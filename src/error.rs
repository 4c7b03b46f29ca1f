//! Error types for hookrun
//!
//! The CLI layer works with `anyhow`, but everything below it returns
//! [`HookrunError`] so the process exit code can be recovered from whatever
//! went wrong.

use thiserror::Error;

use crate::git::GitError;

/// Exit code used when a stash could not be restored cleanly.
pub const EXIT_STASH_CONFLICT: i32 = 3;
/// Exit code used for invalid configuration (sysexits `EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
/// Exit code used for local I/O failures (sysexits `EX_IOERR`).
pub const EXIT_IO: i32 = 74;

/// Core error taxonomy
#[derive(Error, Debug)]
pub enum HookrunError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("step '{step}' failed with exit code {exit_code}")]
    StepFailure { step: String, exit_code: i32 },

    #[error("stashed changes could not be restored: they remain in {stash}\n  recover with: {recovery}")]
    StashConflict { stash: String, recovery: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{} was not installed by hookrun; use --force to replace it", .0.display())]
    ForeignHook(std::path::PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HookrunError {
    /// Process exit code this error should terminate with. Never 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            HookrunError::Git(err) => err.exit_code(),
            HookrunError::StepFailure { exit_code, .. } => nonzero(*exit_code),
            HookrunError::StashConflict { .. } => EXIT_STASH_CONFLICT,
            HookrunError::Config(_) => EXIT_CONFIG,
            HookrunError::ForeignHook(_) => 1,
            HookrunError::Io(_) => EXIT_IO,
        }
    }
}

/// Extract the exit code carried by an `anyhow` error chain.
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<HookrunError>() {
            return err.exit_code();
        }
        if let Some(err) = cause.downcast_ref::<GitError>() {
            return err.exit_code();
        }
    }
    1
}

pub(crate) fn nonzero(code: i32) -> i32 {
    if code == 0 { 1 } else { code }
}
