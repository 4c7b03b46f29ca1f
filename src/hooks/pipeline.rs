//! Fail-fast sequencing of a hook's steps
//!
//! Each step moves `Pending → Running → Passed | Failed`. The first step
//! that exits non-zero fails the whole pipeline and no later step runs.
//! Nothing is rolled back: files fixed (and staged) by earlier steps stay
//! fixed and staged.

use std::path::PathBuf;
use std::time::Instant;

use super::executor::{RunMode, StepExecutor, StepResult};
use super::interrupt::{EXIT_INTERRUPTED, Interrupt};
use super::stash_guard::{StashGuard, StashOutcome};
use super::step::Step;
use crate::cli::Output;
use crate::error::{EXIT_STASH_CONFLICT, HookrunError};
use crate::git::{GitRepo, StashHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Passed,
    Failed,
}

/// Terminal state of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Passed,
    Failed {
        step: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

impl PipelineResult {
    pub fn passed(&self) -> bool {
        matches!(self, PipelineResult::Passed)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineResult::Passed => 0,
            PipelineResult::Failed { exit_code, .. } => *exit_code,
        }
    }

    /// The failure as an error, for pipelines that did not pass
    pub fn to_error(&self) -> Option<HookrunError> {
        match self {
            PipelineResult::Passed => None,
            PipelineResult::Failed { step, exit_code, .. } => Some(HookrunError::StepFailure {
                step: step.clone(),
                exit_code: *exit_code,
            }),
        }
    }
}

/// One in-progress execution of a hook. Owns its steps, the outcome log and
/// the stash guard, so the stash is restored whenever the run goes away.
pub struct HookRun<'repo> {
    hook: String,
    steps: Vec<Step>,
    states: Vec<StepState>,
    results: Vec<StepResult>,
    stash: Option<StashGuard<'repo>>,
}

impl<'repo> HookRun<'repo> {
    pub fn new(hook: impl Into<String>, steps: Vec<Step>) -> Self {
        let states = vec![StepState::Pending; steps.len()];
        Self {
            hook: hook.into(),
            steps,
            states,
            results: Vec::new(),
            stash: None,
        }
    }

    pub fn with_stash(mut self, guard: StashGuard<'repo>) -> Self {
        self.stash = Some(guard);
        self
    }

    pub fn hook(&self) -> &str {
        &self.hook
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn states(&self) -> &[StepState] {
        &self.states
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn stash_handle(&self) -> Option<&StashHandle> {
        self.stash.as_ref().and_then(StashGuard::handle)
    }

    /// Close the run: restore stashed changes and hand back everything that
    /// happened. The report is only available once the stash is dealt with.
    pub fn finish(mut self, result: PipelineResult) -> RunReport {
        let stash = self
            .stash
            .take()
            .map(StashGuard::end)
            .unwrap_or(StashOutcome::NotStashed);

        RunReport {
            hook: self.hook,
            states: self.states,
            results: self.results,
            result,
            stash,
        }
    }
}

/// Everything a finished hook run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub hook: String,
    pub states: Vec<StepState>,
    pub results: Vec<StepResult>,
    pub result: PipelineResult,
    pub stash: StashOutcome,
}

impl RunReport {
    /// Exit code for a run that does not commit: the failing step's code,
    /// else non-zero if stashed work was left behind, else 0
    pub fn exit_code(&self) -> i32 {
        if !self.result.passed() {
            return crate::error::nonzero(self.result.exit_code());
        }
        if !self.stash.is_restored() {
            return EXIT_STASH_CONFLICT;
        }
        0
    }

    /// Files changed by fix commands across all steps
    pub fn modified_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .results
            .iter()
            .flat_map(|r| r.modified_files.iter().cloned())
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

pub struct HookPipeline<'a> {
    repo: &'a GitRepo,
    executor: StepExecutor<'a>,
    mode: RunMode,
    stage_fixes: bool,
    interrupt: Interrupt,
    output: &'a Output,
}

impl<'a> HookPipeline<'a> {
    pub fn new(repo: &'a GitRepo, mode: RunMode, output: &'a Output) -> Self {
        Self {
            repo,
            executor: StepExecutor::new(repo),
            mode,
            stage_fixes: false,
            interrupt: Interrupt::new(),
            output,
        }
    }

    /// `git add` files a fix command modified, right after the step
    pub fn stage_fixes(mut self, stage: bool) -> Self {
        self.stage_fixes = stage;
        self
    }

    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn commit_msg_file(mut self, path: Option<PathBuf>) -> Self {
        self.executor = self.executor.with_commit_msg_file(path);
        self
    }

    /// Run every step in order, stopping at the first failure
    pub fn run(
        &self,
        run: &mut HookRun<'_>,
        candidates: &[PathBuf],
    ) -> Result<PipelineResult, HookrunError> {
        tracing::info!(
            "running {} ({} steps, {} candidate files)",
            run.hook,
            run.steps.len(),
            candidates.len()
        );

        for index in 0..run.steps.len() {
            let step = &run.steps[index];

            if self.interrupt.is_triggered() {
                run.states[index] = StepState::Failed;
                self.output.error(&format!("{} interrupted before it started", step.name));
                return Ok(PipelineResult::Failed {
                    step: step.name.clone(),
                    exit_code: EXIT_INTERRUPTED,
                    stdout: String::new(),
                    stderr: "interrupted".into(),
                });
            }

            run.states[index] = StepState::Running;
            let started = Instant::now();
            let result = self.executor.execute(step, self.mode, candidates)?;
            tracing::debug!("step '{}' finished in {:?}", step.name, started.elapsed());

            if self.stage_fixes && !result.modified_files.is_empty() {
                // staged even when the fix failed, so the working tree
                // matches the index again before the stash is applied
                self.repo.add(&result.modified_files)?;
            }

            self.output.step_result(&result);

            let interrupted = self.interrupt.is_triggered();
            if result.passed() && !interrupted {
                run.states[index] = StepState::Passed;
                run.results.push(result);
                continue;
            }

            run.states[index] = StepState::Failed;
            let exit_code = if result.passed() { EXIT_INTERRUPTED } else { result.exit_code };
            let failed = PipelineResult::Failed {
                step: result.step.clone(),
                exit_code,
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
            };
            run.results.push(result);
            tracing::info!("{} stopped at step '{}'", run.hook, step.name);
            return Ok(failed);
        }

        Ok(PipelineResult::Passed)
    }
}
