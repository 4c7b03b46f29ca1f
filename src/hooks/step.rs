//! Steps and their command templates
//!
//! Templates are split into an argument vector with shell-words and are
//! never handed to a shell by hookrun itself. `{{files}}` and
//! `{{commit_msg_file}}` are expanded after splitting:
//!
//! - a token that is exactly a placeholder becomes one argument per path
//! - a placeholder inside a larger token (for example the script of
//!   `sh -c "..."`) is replaced by the shell-escaped, space-joined paths

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::StepConfig;
use crate::error::HookrunError;
use crate::shared::glob::FileMatcher;

pub const FILES_PLACEHOLDER: &str = "{{files}}";
pub const COMMIT_MSG_PLACEHOLDER: &str = "{{commit_msg_file}}";

/// One configured check/fix unit. Immutable once built.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub glob: Vec<String>,
    pub exclude: Vec<String>,
    pub check: Option<String>,
    pub fix: Option<String>,
    pub check_first: bool,
    matcher: FileMatcher,
}

impl Step {
    /// Build and validate a step. Any problem is a configuration error so
    /// that a hook never runs with a partially valid step.
    pub fn from_config(config: &StepConfig) -> Result<Self, HookrunError> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(HookrunError::Config("step name cannot be empty".into()));
        }
        if config.check.is_none() && config.fix.is_none() {
            return Err(HookrunError::Config(format!(
                "step '{name}' needs a check or a fix command"
            )));
        }
        for (kind, template) in [("check", &config.check), ("fix", &config.fix)] {
            if let Some(template) = template {
                validate_template(template).map_err(|reason| {
                    HookrunError::Config(format!("step '{name}' {kind} command: {reason}"))
                })?;
            }
        }
        let matcher = FileMatcher::new(&config.glob, &config.exclude).map_err(|e| {
            HookrunError::Config(format!("step '{name}' has an invalid glob: {e}"))
        })?;

        Ok(Self {
            name: name.to_string(),
            glob: config.glob.clone(),
            exclude: config.exclude.clone(),
            check: config.check.clone(),
            fix: config.fix.clone(),
            check_first: config.check_first,
            matcher,
        })
    }

    /// Candidate files this step applies to
    pub fn matching_files(&self, candidates: &[PathBuf]) -> Vec<PathBuf> {
        self.matcher.filter(candidates)
    }

    /// Whether the step only runs when some candidate matched. True when a
    /// glob is configured or a template takes `{{files}}`.
    pub fn needs_files(&self) -> bool {
        self.matcher.has_include() || self.takes_files()
    }

    pub fn takes_files(&self) -> bool {
        [&self.check, &self.fix]
            .into_iter()
            .flatten()
            .any(|t| t.contains(FILES_PLACEHOLDER))
    }
}

/// Values substituted into command templates
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub files: Vec<PathBuf>,
    pub commit_msg_file: Option<PathBuf>,
}

/// A fully expanded command, program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl StepCommand {
    /// Expand `template` against `ctx`
    pub fn render(template: &str, ctx: &TemplateContext) -> Result<Self, HookrunError> {
        let tokens = shell_words::split(template)
            .map_err(|e| HookrunError::Config(format!("cannot parse command '{template}': {e}")))?;

        let files: Vec<String> = ctx.files.iter().map(|f| path_arg(f)).collect();
        let mut argv = Vec::with_capacity(tokens.len() + files.len());

        for token in tokens {
            if token == FILES_PLACEHOLDER {
                argv.extend(files.iter().cloned());
                continue;
            }
            if token == COMMIT_MSG_PLACEHOLDER {
                argv.push(commit_msg_arg(ctx, template)?);
                continue;
            }

            let mut expanded = token;
            if expanded.contains(FILES_PLACEHOLDER) {
                expanded = expanded.replace(FILES_PLACEHOLDER, &shell_words::join(&files));
            }
            if expanded.contains(COMMIT_MSG_PLACEHOLDER) {
                let quoted = shell_words::quote(&commit_msg_arg(ctx, template)?).into_owned();
                expanded = expanded.replace(COMMIT_MSG_PLACEHOLDER, &quoted);
            }
            argv.push(expanded);
        }

        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| HookrunError::Config(format!("command '{template}' is empty")))?;

        Ok(Self {
            program,
            args: argv.collect(),
        })
    }

    /// Process builder running in `cwd`
    pub fn to_command(&self, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(cwd);
        command
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

fn validate_template(template: &str) -> Result<(), String> {
    let tokens = shell_words::split(template).map_err(|e| e.to_string())?;
    match tokens.first() {
        None => Err("command is empty".into()),
        Some(first) if first == FILES_PLACEHOLDER || first == COMMIT_MSG_PLACEHOLDER => {
            Err("command must start with a program, not a placeholder".into())
        }
        Some(_) => Ok(()),
    }
}

fn commit_msg_arg(ctx: &TemplateContext, template: &str) -> Result<String, HookrunError> {
    ctx.commit_msg_file.as_deref().map(path_arg).ok_or_else(|| {
        HookrunError::Config(format!(
            "command '{template}' uses {COMMIT_MSG_PLACEHOLDER} outside of a commit-msg hook"
        ))
    })
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(files: &[&str]) -> TemplateContext {
        TemplateContext {
            files: files.iter().map(PathBuf::from).collect(),
            commit_msg_file: None,
        }
    }

    fn step(check: Option<&str>, fix: Option<&str>, glob: &[&str]) -> Result<Step, HookrunError> {
        Step::from_config(&StepConfig {
            name: "lint".into(),
            glob: glob.iter().map(|g| g.to_string()).collect(),
            exclude: vec![],
            check: check.map(String::from),
            fix: fix.map(String::from),
            check_first: true,
        })
    }

    #[test]
    fn test_standalone_placeholder_expands_to_separate_args() {
        let cmd =
            StepCommand::render("prettier --check {{files}}", &ctx(&["a b.js", "c.js"])).unwrap();
        assert_eq!(cmd.program, "prettier");
        assert_eq!(cmd.args, vec!["--check", "a b.js", "c.js"]);
    }

    #[test]
    fn test_embedded_placeholder_is_shell_escaped() {
        let cmd = StepCommand::render(
            "sh -c 'cat {{files}} > /dev/null'",
            &ctx(&["it's.txt", "plain.txt"]),
        )
        .unwrap();
        assert_eq!(cmd.program, "sh");
        assert_eq!(cmd.args[0], "-c");
        assert_eq!(cmd.args[1], r#"cat 'it'\''s.txt' plain.txt > /dev/null"#);
    }

    #[test]
    fn test_malicious_file_name_stays_one_argument() {
        let cmd = StepCommand::render("wc -l {{files}}", &ctx(&["x; rm -rf ~"])).unwrap();
        assert_eq!(cmd.args, vec!["-l", "x; rm -rf ~"]);
    }

    #[test]
    fn test_commit_msg_placeholder() {
        let mut context = ctx(&[]);
        assert!(StepCommand::render("check-msg {{commit_msg_file}}", &context).is_err());

        context.commit_msg_file = Some(PathBuf::from(".git/COMMIT_EDITMSG"));
        let cmd = StepCommand::render("check-msg {{commit_msg_file}}", &context).unwrap();
        assert_eq!(cmd.args, vec![".git/COMMIT_EDITMSG"]);
        assert_eq!(cmd.to_string(), "check-msg .git/COMMIT_EDITMSG");
    }

    #[test]
    fn test_empty_file_list_renders_no_args() {
        let cmd = StepCommand::render("cargo fmt -- {{files}}", &ctx(&[])).unwrap();
        assert_eq!(cmd.args, vec!["fmt", "--"]);
    }

    #[test]
    fn test_step_validation_fails_closed() {
        assert!(step(None, None, &[]).is_err());
        assert!(step(Some("   "), None, &[]).is_err());
        assert!(step(Some("echo 'unterminated"), None, &[]).is_err());
        assert!(step(Some("{{files}}"), None, &[]).is_err());
        assert!(step(Some("true"), None, &["src/["]).is_err());
        assert!(step(Some("true"), Some("true"), &["*.rs"]).is_ok());
    }

    #[test]
    fn test_needs_files() {
        assert!(!step(Some("true"), None, &[]).unwrap().needs_files());
        assert!(step(Some("true"), None, &["*.rs"]).unwrap().needs_files());
        assert!(step(None, Some("fmt {{files}}"), &[]).unwrap().needs_files());
    }
}
