use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::Session;
use crate::config::PRE_COMMIT;
use crate::hooks::{HookOptions, RunMode, run_hook};

#[derive(Args)]
pub struct FixArgs {
    /// Hook whose steps to run
    #[arg(long, default_value = PRE_COMMIT)]
    pub hook: String,

    /// Files to fix (default: all tracked files)
    pub files: Vec<PathBuf>,
}

/// Fix the working tree in place. Nothing is stashed, staged or committed;
/// steps without a fix command are skipped.
pub async fn execute(args: FixArgs, session: &Session) -> Result<i32> {
    let files = if args.files.is_empty() {
        session.repo.tracked_files().context("Failed to list tracked files")?
    } else {
        session.repo_paths(&args.files)?
    };

    let options = HookOptions {
        mode: RunMode::FixOnly,
        ..HookOptions::check_only()
    };
    let steps = session.config.steps(&args.hook)?;
    let report = run_hook(
        &session.repo,
        &args.hook,
        steps,
        &files,
        &options,
        &session.interrupt,
        &session.output,
    )?;

    let modified = report.modified_files();
    if report.result.passed() {
        if modified.is_empty() {
            session.output.success("nothing to fix");
        } else {
            session.output.success(&format!("fixed {} file(s)", modified.len()));
            for file in &modified {
                session.output.list_item(&file.display().to_string());
            }
        }
    }

    Ok(report.exit_code())
}
