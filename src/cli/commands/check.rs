use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::Session;
use crate::config::PRE_COMMIT;
use crate::hooks::{HookOptions, run_hook};

#[derive(Args)]
pub struct CheckArgs {
    /// Hook whose steps to run
    #[arg(long, default_value = PRE_COMMIT)]
    pub hook: String,

    /// Check every tracked file instead of the staged ones
    #[arg(long, conflicts_with = "files")]
    pub all_files: bool,

    /// Files to check (default: staged files)
    pub files: Vec<PathBuf>,
}

/// Run check commands only. Nothing is stashed, fixed or staged, so running
/// it twice gives the same result.
pub async fn execute(args: CheckArgs, session: &Session) -> Result<i32> {
    let files = if !args.files.is_empty() {
        session.repo_paths(&args.files)?
    } else if args.all_files {
        session.repo.tracked_files().context("Failed to list tracked files")?
    } else {
        session.repo.staged_files().context("Failed to list staged files")?
    };

    let steps = session.config.steps(&args.hook)?;
    let report = run_hook(
        &session.repo,
        &args.hook,
        steps,
        &files,
        &HookOptions::check_only(),
        &session.interrupt,
        &session.output,
    )?;

    match report.result.to_error() {
        None => session
            .output
            .success(&format!("all checks passed ({} file(s))", files.len())),
        Some(err) => session.output.error(&err.to_string()),
    }

    Ok(report.exit_code())
}
