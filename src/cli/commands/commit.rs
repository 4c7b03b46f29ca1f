use anyhow::{Context, Result};
use clap::Args;
use std::fs;

use super::Session;
use crate::config::{COMMIT_MSG, PRE_COMMIT};
use crate::hooks::{CommitDecision, CommitGate, HookOptions, RunMode, run_hook};

#[derive(Args)]
pub struct CommitArgs {
    /// Commit message
    #[arg(short, long)]
    pub message: String,

    /// Hook whose steps gate the commit
    #[arg(long, default_value = PRE_COMMIT)]
    pub hook: String,

    /// Leave unstaged changes in place while steps run
    #[arg(long)]
    pub no_stash: bool,

    /// Run check commands only, never fix commands
    #[arg(long)]
    pub no_fix: bool,
}

pub async fn execute(args: CommitArgs, session: &Session) -> Result<i32> {
    let Session {
        repo,
        config,
        output,
        interrupt,
    } = session;

    let staged = repo.staged_files().context("Failed to list staged files")?;
    if staged.is_empty() {
        output.error("nothing staged to commit");
        return Ok(1);
    }

    let steps = config.steps(&args.hook)?;
    let mut options = HookOptions::from_settings(&config.hook(&args.hook));
    if args.no_stash {
        options.stash = false;
    }
    if args.no_fix {
        options.mode = RunMode::Check;
    }

    let branch = repo.current_branch().unwrap_or_else(|_| "HEAD".to_string());
    output.header(&format!("{} on {branch} ({} staged file(s))", args.hook, staged.len()));
    let report = run_hook(repo, &args.hook, steps, &staged, &options, interrupt, output)?;
    output.stash_outcome(&report.stash);

    let mut decision = CommitGate::decide(&report.result);
    let mut message = args.message;
    if decision == CommitDecision::Proceed && config.is_configured(COMMIT_MSG) {
        (decision, message) = commit_msg(session, message)?;
    }

    let outcome = CommitGate::conclude(repo, &report, &decision, &message)?;
    match (&outcome.commit, &decision) {
        (Some(commit), _) => output.success(&format!("committed {}", commit.short())),
        (None, CommitDecision::Abort { step, exit_code }) => {
            output.error(&format!("commit aborted: step '{step}' exited {exit_code}"))
        }
        (None, CommitDecision::Proceed) => {}
    }

    Ok(outcome.exit_code)
}

/// Run the commit-msg steps against the message the way git would, through
/// a message file they may rewrite
fn commit_msg(session: &Session, message: String) -> Result<(CommitDecision, String)> {
    let Session {
        repo,
        config,
        output,
        interrupt,
    } = session;

    let path = repo.git_dir().join("COMMIT_EDITMSG");
    fs::write(&path, format!("{}\n", message.trim_end()))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let mut options = HookOptions::from_settings(&config.hook(COMMIT_MSG));
    options.stash = false;
    options.commit_msg_file = Some(path.clone());

    output.header(COMMIT_MSG);
    let steps = config.steps(COMMIT_MSG)?;
    let report = run_hook(repo, COMMIT_MSG, steps, &[], &options, interrupt, output)?;

    let message =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((CommitGate::decide(&report.result), message))
}
