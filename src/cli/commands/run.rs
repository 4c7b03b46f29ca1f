use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::Session;
use crate::config::{KNOWN_HOOKS, PRE_COMMIT, is_message_hook};
use crate::error::HookrunError;
use crate::hooks::{HookOptions, run_hook};

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Hook name to run
    pub hook: String,

    /// Arguments git passed to the hook
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Execute a hook as git would. Never commits; the exit code is the verdict
/// git acts on.
pub async fn execute(args: RunArgs, session: &Session) -> Result<i32> {
    if !KNOWN_HOOKS.contains(&args.hook.as_str()) {
        return Err(HookrunError::Config(format!("unknown hook '{}'", args.hook)).into());
    }

    let steps = session.config.steps(&args.hook)?;
    if steps.is_empty() {
        session
            .output
            .verbose(&format!("no steps configured for {}", args.hook));
        return Ok(0);
    }

    let mut options = HookOptions::from_settings(&session.config.hook(&args.hook));
    let files = if is_message_hook(&args.hook) {
        // git passes the message file as the first argument
        let path = args.args.first().map(PathBuf::from).with_context(|| {
            format!("{} expects the commit message file as its first argument", args.hook)
        })?;
        options.commit_msg_file = Some(std::path::absolute(&path)?);
        options.stash = false;
        Vec::new()
    } else if args.hook == PRE_COMMIT {
        session.repo.staged_files().context("Failed to list staged files")?
    } else {
        session.repo.tracked_files().context("Failed to list tracked files")?
    };

    let report = run_hook(
        &session.repo,
        &args.hook,
        steps,
        &files,
        &options,
        &session.interrupt,
        &session.output,
    )?;
    session.output.stash_outcome(&report.stash);
    if let Some(err) = report.result.to_error() {
        session.output.error(&format!("{}: {err}", args.hook));
    }

    Ok(report.exit_code())
}
