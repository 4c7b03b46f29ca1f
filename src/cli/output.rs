//! User-facing output for hookrun
//!
//! Progress and results go to stdout; errors and the output of failing steps
//! go to stderr so they survive `--quiet`.

use console::style;

use crate::hooks::executor::SkipReason;
use crate::hooks::{StashOutcome, StepResult};

/// Lines of captured output shown for a failing step
const FAILURE_TAIL: usize = 40;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Errors are always shown, even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✖").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    /// Only shown with `-v`
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("{}", style(title).bold());
        }
    }

    pub fn list_item(&self, item: &str) {
        if !self.quiet {
            println!("  • {}", item);
        }
    }

    /// One status line per step, plus the captured output of a failure
    pub fn step_result(&self, result: &StepResult) {
        if !result.passed() {
            eprintln!(
                "{} {} {}",
                style("✖").red().bold(),
                style(&result.step).bold(),
                style(format!("(exit {})", result.exit_code)).red()
            );
            self.captured(&result.stdout);
            self.captured(&result.stderr);
            return;
        }

        if self.quiet {
            return;
        }

        let detail = match result.skipped {
            Some(SkipReason::NoMatchingFiles) => Some("no matching files".to_string()),
            Some(SkipReason::NoCommandForMode) => Some("nothing to run in this mode".to_string()),
            None if result.fix_skipped_due_to_passing_check => {
                Some("check passed, fix skipped".to_string())
            }
            None if !result.modified_files.is_empty() => {
                Some(format!("fixed {} file(s)", result.modified_files.len()))
            }
            None => None,
        };

        match (result.skipped, detail) {
            (Some(_), Some(detail)) => {
                println!(
                    "{} {} {}",
                    style("○").dim(),
                    style(&result.step).dim(),
                    style(format!("({detail})")).dim()
                )
            }
            (None, Some(detail)) => {
                println!(
                    "{} {} {}",
                    style("✔").green(),
                    result.step,
                    style(format!("({detail})")).dim()
                )
            }
            _ => println!("{} {}", style("✔").green(), result.step),
        }

        if self.verbose {
            for file in &result.modified_files {
                println!("    {} {}", style("~").yellow(), file.display());
            }
        }
    }

    /// Report what happened to stashed changes. A pending stash is printed
    /// with its recovery command regardless of `--quiet`.
    pub fn stash_outcome(&self, outcome: &StashOutcome) {
        match outcome {
            StashOutcome::NotStashed => {}
            StashOutcome::Restored { handle } => {
                self.verbose(&format!("restored unstaged changes from {handle}"));
            }
            StashOutcome::RestoredKept { handle, reason } => {
                self.warning(&format!(
                    "unstaged changes restored, but {handle} could not be dropped: {reason}"
                ));
            }
            StashOutcome::Pending { handle, reason } => {
                eprintln!(
                    "{} {}",
                    style("✖").red().bold(),
                    style("unstaged changes could not be restored").red().bold()
                );
                eprintln!("    {}", reason);
                eprintln!("    your changes are kept in {handle}");
                eprintln!("    recover them with: {}", style(handle.recovery_command()).bold());
            }
        }
    }

    fn captured(&self, text: &str) {
        let lines: Vec<&str> = text.lines().collect();
        let skipped = lines.len().saturating_sub(FAILURE_TAIL);
        if skipped > 0 {
            eprintln!("    {}", style(format!("... {skipped} earlier line(s)")).dim());
        }
        for line in &lines[skipped..] {
            eprintln!("    {}", line);
        }
    }
}
