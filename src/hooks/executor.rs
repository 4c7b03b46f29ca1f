use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use super::step::{Step, StepCommand, TemplateContext};
use crate::error::HookrunError;
use crate::git::GitRepo;

/// Exit code reported when a step's program cannot be found
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;
/// Exit code reported when a step's program exists but cannot be started
pub const EXIT_CANNOT_EXECUTE: i32 = 126;

/// Which commands a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Check commands only; nothing is modified
    Check,
    /// Fix commands (check-first where configured); check-only steps still
    /// run their check and gate the hook
    Fix,
    /// Fix commands only; steps without a fix command are skipped
    FixOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoMatchingFiles,
    NoCommandForMode,
}

/// Exit code and captured output of one command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: String,
    pub exit_code: i32,
    /// Files handed to the step
    pub files: Vec<PathBuf>,
    /// Files the fix command changed
    pub modified_files: Vec<PathBuf>,
    pub stdout: String,
    pub stderr: String,
    pub ran_check: bool,
    pub ran_fix: bool,
    /// Check-first found nothing to fix, so the fix command never ran
    pub fix_skipped_due_to_passing_check: bool,
    pub skipped: Option<SkipReason>,
}

impl StepResult {
    fn skipped(step: &Step, files: Vec<PathBuf>, reason: SkipReason) -> Self {
        Self {
            step: step.name.clone(),
            exit_code: 0,
            files,
            modified_files: Vec::new(),
            stdout: String::new(),
            stderr: String::new(),
            ran_check: false,
            ran_fix: false,
            fix_skipped_due_to_passing_check: false,
            skipped: Some(reason),
        }
    }

    fn from_outcome(step: &Step, files: Vec<PathBuf>, outcome: CommandOutcome) -> Self {
        Self {
            step: step.name.clone(),
            exit_code: outcome.exit_code,
            files,
            modified_files: Vec::new(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            ran_check: false,
            ran_fix: false,
            fix_skipped_due_to_passing_check: false,
            skipped: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a single step's check and fix commands
pub struct StepExecutor<'repo> {
    repo: &'repo GitRepo,
    commit_msg_file: Option<PathBuf>,
}

impl<'repo> StepExecutor<'repo> {
    pub fn new(repo: &'repo GitRepo) -> Self {
        Self {
            repo,
            commit_msg_file: None,
        }
    }

    pub fn with_commit_msg_file(mut self, path: Option<PathBuf>) -> Self {
        self.commit_msg_file = path;
        self
    }

    /// Run the step according to `mode` against the candidate files
    pub fn execute(
        &self,
        step: &Step,
        mode: RunMode,
        candidates: &[PathBuf],
    ) -> Result<StepResult, HookrunError> {
        let files = step.matching_files(candidates);
        if step.needs_files() && files.is_empty() {
            tracing::debug!("step '{}' has no matching files", step.name);
            return Ok(StepResult::skipped(step, files, SkipReason::NoMatchingFiles));
        }

        match mode {
            RunMode::Check => match step.check {
                Some(_) => self.check_only(step, files),
                None => Ok(StepResult::skipped(step, files, SkipReason::NoCommandForMode)),
            },
            RunMode::Fix | RunMode::FixOnly => match (&step.check, &step.fix) {
                (_, Some(_)) => self.check_then_fix(step, files),
                (Some(_), None) if mode == RunMode::Fix => self.check_only(step, files),
                _ => Ok(StepResult::skipped(step, files, SkipReason::NoCommandForMode)),
            },
        }
    }

    /// Run the check command. The real exit code is returned as-is.
    pub fn run_check(
        &self,
        step: &Step,
        files: &[PathBuf],
    ) -> Result<CommandOutcome, HookrunError> {
        match &step.check {
            Some(template) => self.run_template(step, "check", template, files),
            None => Ok(CommandOutcome::default()),
        }
    }

    /// Run the fix command and report which files it changed
    pub fn run_fix(
        &self,
        step: &Step,
        files: &[PathBuf],
    ) -> Result<(CommandOutcome, Vec<PathBuf>), HookrunError> {
        let Some(template) = &step.fix else {
            return Ok((CommandOutcome::default(), Vec::new()));
        };

        let before = self.fingerprint(files);
        let outcome = self.run_template(step, "fix", template, files)?;
        let after = self.fingerprint(files);

        let modified = files
            .iter()
            .filter(|f| before.get(*f) != after.get(*f))
            .cloned()
            .collect();

        Ok((outcome, modified))
    }

    fn check_only(&self, step: &Step, files: Vec<PathBuf>) -> Result<StepResult, HookrunError> {
        let outcome = self.run_check(step, &files)?;
        let mut result = StepResult::from_outcome(step, files, outcome);
        result.ran_check = true;
        Ok(result)
    }

    fn check_then_fix(&self, step: &Step, files: Vec<PathBuf>) -> Result<StepResult, HookrunError> {
        if step.check_first && step.check.is_some() {
            let check = self.run_check(step, &files)?;
            if check.success() {
                tracing::info!("step '{}': check passed, fix skipped", step.name);
                let mut result = StepResult::from_outcome(step, files, check);
                result.ran_check = true;
                result.fix_skipped_due_to_passing_check = true;
                return Ok(result);
            }
            tracing::info!(
                "step '{}': check exited {}, running fix",
                step.name,
                check.exit_code
            );
        }

        let (outcome, modified) = self.run_fix(step, &files)?;
        let mut result = StepResult::from_outcome(step, files, outcome);
        result.ran_check = step.check_first && step.check.is_some();
        result.ran_fix = true;
        result.modified_files = modified;
        Ok(result)
    }

    fn run_template(
        &self,
        step: &Step,
        kind: &str,
        template: &str,
        files: &[PathBuf],
    ) -> Result<CommandOutcome, HookrunError> {
        let context = TemplateContext {
            files: files.to_vec(),
            commit_msg_file: self.commit_msg_file.clone(),
        };
        let command = StepCommand::render(template, &context)?;
        tracing::debug!("step '{}' {}: {}", step.name, kind, command);

        Ok(spawn(&command, self.repo.root()))
    }

    fn fingerprint(&self, files: &[PathBuf]) -> BTreeMap<PathBuf, Option<String>> {
        files
            .iter()
            .map(|f| (f.clone(), self.repo.hash_file(f)))
            .collect()
    }
}

fn spawn(command: &StepCommand, cwd: &Path) -> CommandOutcome {
    if which::which_in(&command.program, std::env::var_os("PATH"), cwd).is_err() {
        return CommandOutcome {
            exit_code: EXIT_COMMAND_NOT_FOUND,
            stdout: String::new(),
            stderr: format!("hookrun: command not found: {}", command.program),
        };
    }

    match command.to_command(cwd).stdin(Stdio::null()).output() {
        Ok(output) => CommandOutcome {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) => CommandOutcome {
            exit_code: EXIT_CANNOT_EXECUTE,
            stdout: String::new(),
            stderr: format!("hookrun: cannot execute {}: {e}", command.program),
        },
    }
}

/// Exit code of a finished process; death by signal N is reported as 128 + N
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepConfig;
    use crate::git::test_support::init_repo;
    use std::fs;

    fn step(check: Option<&str>, fix: Option<&str>, glob: &[&str]) -> Step {
        Step::from_config(&StepConfig {
            name: "test-step".into(),
            glob: glob.iter().map(|g| g.to_string()).collect(),
            exclude: vec![],
            check: check.map(String::from),
            fix: fix.map(String::from),
            check_first: true,
        })
        .unwrap()
    }

    fn files(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_check_exit_code_is_not_reinterpreted() {
        let (_temp, repo) = init_repo();
        let executor = StepExecutor::new(&repo);

        let result = executor
            .execute(&step(Some("sh -c 'echo oops >&2; exit 3'"), None, &[]), RunMode::Check, &[])
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr.trim(), "oops");
        assert!(result.ran_check);
        assert!(!result.ran_fix);
    }

    #[test]
    fn test_passing_check_skips_fix_observably() {
        let (temp, repo) = init_repo();
        let executor = StepExecutor::new(&repo);
        let marker = temp.path().join("fixed");

        let s = step(Some("true"), Some("touch fixed"), &[]);
        let result = executor.execute(&s, RunMode::Fix, &[]).unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.fix_skipped_due_to_passing_check);
        assert!(!result.ran_fix);
        assert!(!marker.exists());
    }

    #[test]
    fn test_failing_check_runs_fix_and_reports_modified_files() {
        let (temp, repo) = init_repo();
        fs::write(temp.path().join("a.txt"), "no newline").unwrap();
        fs::write(temp.path().join("b.txt"), "fine\n").unwrap();
        let executor = StepExecutor::new(&repo);

        let s = step(
            Some("false"),
            Some(r#"sh -c 'for f in "$@"; do tail -c1 "$f" | read -r _ || echo >> "$f"; done' _ {{files}}"#),
            &["*.txt"],
        );
        let result = executor
            .execute(&s, RunMode::Fix, &files(&["a.txt", "b.txt", "README.md"]))
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.ran_check);
        assert!(result.ran_fix);
        assert!(!result.fix_skipped_due_to_passing_check);
        assert_eq!(result.files, files(&["a.txt", "b.txt"]));
        assert_eq!(result.modified_files, files(&["a.txt"]));
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "no newline\n");
    }

    #[test]
    fn test_check_first_disabled_always_fixes() {
        let (temp, repo) = init_repo();
        let executor = StepExecutor::new(&repo);
        let mut s = step(Some("true"), Some("touch fixed"), &[]);
        s.check_first = false;

        let result = executor.execute(&s, RunMode::Fix, &[]).unwrap();
        assert!(result.ran_fix);
        assert!(!result.ran_check);
        assert!(temp.path().join("fixed").exists());
    }

    #[test]
    fn test_skips() {
        let (_temp, repo) = init_repo();
        let executor = StepExecutor::new(&repo);

        let globbed = step(Some("true"), None, &["*.py"]);
        let result = executor.execute(&globbed, RunMode::Check, &files(&["README.md"])).unwrap();
        assert_eq!(result.skipped, Some(SkipReason::NoMatchingFiles));
        assert!(result.passed());

        let fix_only = step(None, Some("true"), &[]);
        let result = executor.execute(&fix_only, RunMode::Check, &[]).unwrap();
        assert_eq!(result.skipped, Some(SkipReason::NoCommandForMode));

        let check_only = step(Some("false"), None, &[]);
        let result = executor.execute(&check_only, RunMode::FixOnly, &[]).unwrap();
        assert_eq!(result.skipped, Some(SkipReason::NoCommandForMode));
        let result = executor.execute(&check_only, RunMode::Fix, &[]).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_missing_program_is_a_step_failure() {
        let (_temp, repo) = init_repo();
        let executor = StepExecutor::new(&repo);
        let result = executor
            .execute(&step(Some("hookrun-no-such-program --flag"), None, &[]), RunMode::Check, &[])
            .unwrap();
        assert_eq!(result.exit_code, EXIT_COMMAND_NOT_FOUND);
        assert!(result.stderr.contains("command not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_exit_code() {
        let (_temp, repo) = init_repo();
        let executor = StepExecutor::new(&repo);
        let result = executor
            .execute(&step(Some("sh -c 'kill -TERM $$'"), None, &[]), RunMode::Check, &[])
            .unwrap();
        assert_eq!(result.exit_code, 128 + 15);
    }
}
