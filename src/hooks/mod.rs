//! Hook execution
//!
//! A hook run is assembled from a few pieces:
//!
//! - [`StashGuard`] sets unstaged work aside and puts it back afterwards
//! - [`HookPipeline`] runs the configured [`Step`]s in order and stops at
//!   the first failure
//! - [`StepExecutor`] runs one step's check/fix commands
//! - [`CommitGate`] turns the result into a commit decision and exit code

pub mod executor;
pub mod gate;
pub mod install;
pub mod interrupt;
pub mod pipeline;
pub mod stash_guard;
pub mod step;

use std::path::PathBuf;

pub use executor::{RunMode, StepExecutor, StepResult};
pub use gate::{CommitDecision, CommitGate, CommitOutcome};
pub use interrupt::Interrupt;
pub use pipeline::{HookPipeline, HookRun, PipelineResult, RunReport, StepState};
pub use stash_guard::{StashGuard, StashOutcome};
pub use step::Step;

use crate::cli::Output;
use crate::config::HookSettings;
use crate::error::HookrunError;
use crate::git::GitRepo;

/// How a single hook run behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOptions {
    pub mode: RunMode,
    pub stash: bool,
    pub stash_untracked: bool,
    pub stage_fixes: bool,
    pub commit_msg_file: Option<PathBuf>,
}

impl HookOptions {
    /// Options as configured for the hook
    pub fn from_settings(settings: &HookSettings) -> Self {
        Self {
            mode: if settings.fix { RunMode::Fix } else { RunMode::Check },
            stash: settings.stash,
            stash_untracked: settings.stash_untracked,
            stage_fixes: settings.stage_fixes,
            commit_msg_file: None,
        }
    }

    /// Read-only run: checks only, nothing stashed or staged
    pub fn check_only() -> Self {
        Self {
            mode: RunMode::Check,
            stash: false,
            stash_untracked: false,
            stage_fixes: false,
            commit_msg_file: None,
        }
    }
}

/// Run `steps` as `hook` against `files`: stash, pipeline, restore.
///
/// The stash is restored before this returns, on success, on step failure
/// and on error. Only a failure to stash in the first place means no step
/// ran.
pub fn run_hook(
    repo: &GitRepo,
    hook: &str,
    steps: Vec<Step>,
    files: &[PathBuf],
    options: &HookOptions,
    interrupt: &Interrupt,
    output: &Output,
) -> Result<RunReport, HookrunError> {
    let guard = if options.stash {
        StashGuard::begin(repo, options.stash_untracked, hook)?
    } else {
        StashGuard::disabled(repo)
    };
    if let Some(handle) = guard.handle() {
        output.verbose(&format!("unstaged changes set aside in {handle}"));
    }

    let mut run = HookRun::new(hook, steps).with_stash(guard);
    let pipeline = HookPipeline::new(repo, options.mode, output)
        .stage_fixes(options.stage_fixes)
        .interrupt(interrupt.clone())
        .commit_msg_file(options.commit_msg_file.clone());

    // on `?` the run is dropped and the guard restores from Drop
    let result = pipeline.run(&mut run, files)?;
    Ok(run.finish(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepConfig;
    use crate::git::test_support::*;
    use std::fs;

    fn step(name: &str, check: Option<&str>, fix: Option<&str>) -> Step {
        Step::from_config(&StepConfig {
            name: name.into(),
            glob: vec![],
            exclude: vec![],
            check: check.map(String::from),
            fix: fix.map(String::from),
            check_first: true,
        })
        .unwrap()
    }

    #[test]
    fn test_steps_only_see_staged_content() {
        let (temp, repo) = init_repo();
        let dir = temp.path();
        fs::write(dir.join("README.md"), "hello\nwork in progress\n").unwrap();
        let output = Output::new(false, true);

        // fails if the unstaged line is visible to the step
        let steps = vec![step("staged-only", Some("sh -c '! grep -q progress README.md'"), None)];
        let options = HookOptions::from_settings(&HookSettings::default());
        let report = run_hook(
            &repo,
            "pre-commit",
            steps,
            &[],
            &options,
            &Interrupt::new(),
            &output,
        )
        .unwrap();

        assert!(report.result.passed());
        assert!(matches!(report.stash, StashOutcome::Restored { .. }));
        assert_eq!(
            fs::read_to_string(dir.join("README.md")).unwrap(),
            "hello\nwork in progress\n"
        );
    }

    #[test]
    fn test_check_only_never_stashes() {
        let (temp, repo) = init_repo();
        let dir = temp.path();
        fs::write(dir.join("README.md"), "hello\nunstaged\n").unwrap();
        let output = Output::new(false, true);

        let steps = vec![step(
            "sees-worktree",
            Some("grep -q unstaged README.md"),
            Some("touch fixed"),
        )];
        let report = run_hook(
            &repo,
            "pre-commit",
            steps,
            &[],
            &HookOptions::check_only(),
            &Interrupt::new(),
            &output,
        )
        .unwrap();

        assert!(report.result.passed());
        assert_eq!(report.stash, StashOutcome::NotStashed);
        assert!(!dir.join("fixed").exists());
    }

    #[test]
    fn test_step_breaking_the_run_still_restores_stash() {
        let (temp, repo) = init_repo();
        let dir = temp.path();
        fs::write(dir.join("a.txt"), "a\n").unwrap();
        git(dir, &["add", "a.txt"]);
        fs::write(dir.join("README.md"), "hello\nprecious\n").unwrap();
        let output = Output::new(false, true);

        // the fix holds the index lock, so staging its output fails mid-run
        let steps = vec![step(
            "locks-index",
            Some("false"),
            Some("sh -c 'echo fixed >> a.txt && touch .git/index.lock'"),
        )];
        let options = HookOptions::from_settings(&HookSettings::default());
        let err = run_hook(
            &repo,
            "pre-commit",
            steps,
            &[PathBuf::from("a.txt")],
            &options,
            &Interrupt::new(),
            &output,
        )
        .unwrap_err();

        assert!(matches!(err, HookrunError::Git(_)));
        assert_eq!(fs::read_to_string(dir.join("README.md")).unwrap(), "hello\nprecious\n");
        assert_eq!(repo.git_stdout(["stash", "list"]).unwrap(), "");
    }

    #[test]
    fn test_panic_while_pipeline_runs_restores_stash() {
        let (temp, repo) = init_repo();
        let dir = temp.path();
        fs::write(dir.join("README.md"), "hello\nprecious\n").unwrap();
        let output = Output::new(false, true);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let guard = StashGuard::begin(&repo, true, "pre-commit").unwrap();
            let steps = vec![step("lint", Some("sh -c 'exit 9'"), None)];
            let mut run = HookRun::new("pre-commit", steps).with_stash(guard);
            let result = HookPipeline::new(&repo, RunMode::Check, &output)
                .run(&mut run, &[])
                .unwrap();
            if let PipelineResult::Failed { step: name, exit_code, .. } = result {
                panic!("step {name} exited {exit_code}");
            }
        }));

        assert!(outcome.is_err());
        assert_eq!(fs::read_to_string(dir.join("README.md")).unwrap(), "hello\nprecious\n");
        assert_eq!(repo.git_stdout(["stash", "list"]).unwrap(), "");
    }
}
