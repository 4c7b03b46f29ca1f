//! Decides whether a commit happens and what the process exits with

use std::fmt;
use std::process::ExitCode;

use super::pipeline::{PipelineResult, RunReport};
use super::stash_guard::StashOutcome;
use crate::error::{EXIT_STASH_CONFLICT, HookrunError};
use crate::git::{CommitId, GitRepo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitDecision {
    Proceed,
    Abort { step: String, exit_code: i32 },
}

impl fmt::Display for CommitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitDecision::Proceed => write!(f, "proceed"),
            CommitDecision::Abort { step, exit_code } => {
                write!(f, "abort: step '{step}' exited {exit_code}")
            }
        }
    }
}

/// What the gate did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit: Option<CommitId>,
    pub exit_code: i32,
}

pub struct CommitGate;

impl CommitGate {
    /// Pure mapping from a pipeline result to a commit decision
    pub fn decide(result: &PipelineResult) -> CommitDecision {
        match result {
            PipelineResult::Passed => CommitDecision::Proceed,
            PipelineResult::Failed { step, exit_code, .. } => CommitDecision::Abort {
                step: step.clone(),
                exit_code: crate::error::nonzero(*exit_code),
            },
        }
    }

    /// Act on `decision`. Takes the finished [`RunReport`] so the stash has
    /// already been restored (or left pending) by the time git commits.
    ///
    /// A pending stash does not stop the commit, since the index does not
    /// depend on the unstaged work, but the exit code still reports it.
    pub fn conclude(
        repo: &GitRepo,
        report: &RunReport,
        decision: &CommitDecision,
        message: &str,
    ) -> Result<CommitOutcome, HookrunError> {
        let stash_code = stash_exit_code(&report.stash);

        match decision {
            CommitDecision::Abort { step, exit_code } => {
                tracing::info!("commit aborted by step '{step}' (exit {exit_code})");
                Ok(CommitOutcome {
                    commit: None,
                    exit_code: *exit_code,
                })
            }
            CommitDecision::Proceed => {
                let commit = repo.commit(message)?;
                tracing::info!("created commit {}", commit.short());
                Ok(CommitOutcome {
                    commit: Some(commit),
                    exit_code: stash_code,
                })
            }
        }
    }
}

fn stash_exit_code(outcome: &StashOutcome) -> i32 {
    if outcome.is_restored() { 0 } else { EXIT_STASH_CONFLICT }
}

/// Clamp an exit code into what a process can return. Non-zero codes never
/// wrap to 0.
pub fn to_exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) if code == 0 => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(1),
    }
}
