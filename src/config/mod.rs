//! Configuration for hookrun
//!
//! Hooks and their steps are declared under `[hooks.<name>]`. Loading merges
//! several layers (see [`HookrunConfig::load`]); validation fails closed, so
//! a hook with any invalid step never runs.

pub mod core;
pub mod formats;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::HookrunError;
use crate::hooks::Step;

pub use core::HookrunConfig;
pub use formats::ConfigFormat;

/// Hook names git invokes that hookrun knows how to run
pub const KNOWN_HOOKS: &[&str] = &[
    "pre-commit",
    "prepare-commit-msg",
    "commit-msg",
    "post-commit",
    "pre-rebase",
    "post-checkout",
    "post-merge",
    "pre-push",
];

pub const PRE_COMMIT: &str = "pre-commit";
pub const COMMIT_MSG: &str = "commit-msg";

/// Hooks git calls with the commit message file as first argument
pub fn is_message_hook(hook: &str) -> bool {
    matches!(hook, "commit-msg" | "prepare-commit-msg")
}

/// Per-hook settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookSettings {
    /// Run fix commands (check-first) instead of checks only
    #[serde(default = "default_true")]
    pub fix: bool,

    /// Set unstaged changes aside while steps run
    #[serde(default = "default_true")]
    pub stash: bool,

    #[serde(default = "default_true")]
    pub stash_untracked: bool,

    /// `git add` files that fix commands modified
    #[serde(default = "default_true")]
    pub stage_fixes: bool,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            fix: true,
            stash: true,
            stash_untracked: true,
            stage_fixes: true,
            steps: Vec::new(),
        }
    }
}

/// One step as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    /// Patterns selecting the files the step applies to; a single string or
    /// a list
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub glob: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,

    /// Run `check` before `fix` and skip the fix when the check passes
    #[serde(default = "default_true")]
    pub check_first: bool,
}

fn default_true() -> bool {
    true
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(pattern) => vec![pattern],
        OneOrMany::Many(patterns) => patterns,
    })
}

impl HookrunConfig {
    /// Check every hook and step. The first problem found is returned.
    pub fn validate(&self) -> Result<(), HookrunError> {
        for (hook, settings) in &self.hooks {
            if !KNOWN_HOOKS.contains(&hook.as_str()) {
                return Err(HookrunError::Config(format!(
                    "unknown hook '{hook}' (expected one of: {})",
                    KNOWN_HOOKS.join(", ")
                )));
            }
            build_steps(hook, settings)?;
        }
        Ok(())
    }

    /// Settings for `hook`; defaults when the hook is not configured
    pub fn hook(&self, hook: &str) -> HookSettings {
        self.hooks.get(hook).cloned().unwrap_or_default()
    }

    pub fn is_configured(&self, hook: &str) -> bool {
        self.hooks.get(hook).is_some_and(|settings| !settings.steps.is_empty())
    }

    /// Validated steps of `hook`, in configured order
    pub fn steps(&self, hook: &str) -> Result<Vec<Step>, HookrunError> {
        if !KNOWN_HOOKS.contains(&hook) {
            return Err(HookrunError::Config(format!("unknown hook '{hook}'")));
        }
        match self.hooks.get(hook) {
            Some(settings) => build_steps(hook, settings),
            None => Ok(Vec::new()),
        }
    }

    /// Hooks with at least one step, the default set for `install`
    pub fn configured_hooks(&self) -> Vec<String> {
        self.hooks
            .iter()
            .filter(|(_, settings)| !settings.steps.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn build_steps(hook: &str, settings: &HookSettings) -> Result<Vec<Step>, HookrunError> {
    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(settings.steps.len());

    for config in &settings.steps {
        let step = Step::from_config(config)
            .map_err(|e| HookrunError::Config(format!("hook '{hook}': {}", strip_prefix(&e))))?;
        if !seen.insert(step.name.clone()) {
            return Err(HookrunError::Config(format!(
                "hook '{hook}': duplicate step name '{}'",
                step.name
            )));
        }
        steps.push(step);
    }

    Ok(steps)
}

/// Message of a config error without the "invalid configuration" prefix
fn strip_prefix(err: &HookrunError) -> String {
    match err {
        HookrunError::Config(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Hook map keyed by name
pub type Hooks = BTreeMap<String, HookSettings>;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> HookrunConfig {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn test_glob_accepts_string_or_list() {
        let config = parse(
            r#"
            [[hooks.pre-commit.steps]]
            name = "one"
            glob = "*.rs"
            check = "true"

            [[hooks.pre-commit.steps]]
            name = "many"
            glob = ["*.js", "*.ts"]
            fix = "true"
            "#,
        );
        let steps = &config.hooks["pre-commit"].steps;
        assert_eq!(steps[0].glob, vec!["*.rs"]);
        assert_eq!(steps[1].glob, vec!["*.js", "*.ts"]);
        assert!(steps[0].check_first);
        assert!(config.hooks["pre-commit"].stash);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<HookrunConfig, _> = toml::from_str(
            r#"
            [[hooks.pre-commit.steps]]
            name = "typo"
            chek = "true"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_fails_closed() {
        let unknown_hook = parse(
            r#"
            [[hooks.pre-comit.steps]]
            name = "a"
            check = "true"
            "#,
        );
        assert!(matches!(unknown_hook.validate(), Err(HookrunError::Config(_))));

        let duplicate = parse(
            r#"
            [[hooks.pre-commit.steps]]
            name = "a"
            check = "true"

            [[hooks.pre-commit.steps]]
            name = "a"
            fix = "true"
            "#,
        );
        let err = duplicate.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate step name 'a'"));

        let no_command = parse(
            r#"
            [[hooks.pre-commit.steps]]
            name = "empty"
            "#,
        );
        assert!(no_command.validate().is_err());
        assert!(no_command.steps("pre-commit").is_err());
    }

    #[test]
    fn test_unconfigured_hook_has_no_steps() {
        let config = parse("");
        assert!(config.steps("pre-push").unwrap().is_empty());
        assert!(config.steps("not-a-hook").is_err());
        assert_eq!(config.hook("pre-push"), HookSettings::default());
        assert!(config.configured_hooks().is_empty());
    }
}
