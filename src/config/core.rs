use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Hooks;
use crate::error::HookrunError;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Extensions looked for, in merge order, for user and repository config
const EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Fully merged configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookrunConfig {
    #[serde(default)]
    pub hooks: Hooks,
}

impl HookrunConfig {
    /// Load and validate configuration for the repository at `root`.
    ///
    /// Layers, lowest priority first:
    /// 1. built-in defaults
    /// 2. `~/.config/hookrun/config.{toml,yaml,yml,json}`
    /// 3. `hookrun.{toml,yaml,yml,json}` in the repository root
    /// 4. `custom` (`--config`), format chosen by extension
    /// 5. `HOOKRUN_*` environment variables, nested with `__`
    pub fn load(root: &Path, custom: Option<&Path>) -> Result<Self, HookrunError> {
        Self::load_from(root, custom, user_config_dir().as_deref())
    }

    pub(crate) fn load_from(
        root: &Path,
        custom: Option<&Path>,
        user_dir: Option<&Path>,
    ) -> Result<Self, HookrunError> {
        let config: HookrunConfig = Self::figment(root, custom, user_dir)?
            .extract()
            .map_err(|e| HookrunError::Config(e.to_string()))?;
        config.validate()?;
        tracing::debug!("loaded configuration for {} hook(s)", config.hooks.len());
        Ok(config)
    }

    fn figment(
        root: &Path,
        custom: Option<&Path>,
        user_dir: Option<&Path>,
    ) -> Result<Figment, HookrunError> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(dir) = user_dir {
            figment = merge_any(figment, &dir.join("config"));
        }
        figment = merge_any(figment, &root.join("hookrun"));

        if let Some(path) = custom {
            if !path.is_file() {
                return Err(HookrunError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            tracing::trace!("using config file {}", path.display());
            figment = merge_file(figment, path);
        }

        Ok(figment.merge(Env::prefixed("HOOKRUN_").map(|key| env_key(key.as_str()).into())))
    }
}

/// Merge `<base>.<ext>` for every extension that exists
fn merge_any(mut figment: Figment, base: &Path) -> Figment {
    for ext in EXTENSIONS {
        let path = base.with_extension(ext);
        if path.is_file() {
            tracing::trace!("merging config file {}", path.display());
            figment = merge_file(figment, &path);
        }
    }
    figment
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

/// `HOOKS__PRE_COMMIT__STASH` → `hooks.pre-commit.stash`. Environment names
/// cannot carry `-`, so underscores in the hook name segment become dashes.
fn env_key(key: &str) -> String {
    let mut parts: Vec<String> = key.split("__").map(|p| p.to_ascii_lowercase()).collect();
    if parts.len() > 1 && parts[0] == "hooks" {
        parts[1] = parts[1].replace('_', "-");
    }
    parts.join(".")
}

fn user_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("hookrun"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("hookrun"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_load() {
        let temp = TempDir::new().unwrap();
        let config = HookrunConfig::load_from(temp.path(), None, None).unwrap();
        let settings = config.hook("pre-commit");
        assert!(settings.fix);
        assert!(settings.stash);
        assert!(settings.steps.is_empty());
    }

    #[test]
    fn test_repo_config_formats() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("hookrun.yaml"),
            "hooks:\n  pre-commit:\n    stash_untracked: false\n    steps:\n      - name: lint\n        check: \"true\"\n",
        )
        .unwrap();

        let config = HookrunConfig::load_from(temp.path(), None, None).unwrap();
        let settings = config.hook("pre-commit");
        assert!(!settings.stash_untracked);
        assert!(settings.stash);
        assert_eq!(settings.steps[0].name, "lint");
    }

    #[test]
    fn test_layer_priority() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        fs::create_dir_all(&user).unwrap();
        fs::write(
            user.join("config.toml"),
            "[hooks.pre-commit]\nfix = false\nstash = false\n",
        )
        .unwrap();
        fs::write(temp.path().join("hookrun.toml"), "[hooks.pre-commit]\nfix = true\n").unwrap();
        let custom = temp.path().join("ci.json");
        fs::write(&custom, r#"{"hooks": {"pre-commit": {"stage_fixes": false}}}"#).unwrap();

        let config = HookrunConfig::load_from(temp.path(), Some(&custom), Some(&user)).unwrap();
        let settings = config.hook("pre-commit");
        assert!(settings.fix);
        assert!(!settings.stash);
        assert!(!settings.stage_fixes);
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(matches!(
            HookrunConfig::load_from(temp.path(), Some(&missing), None),
            Err(HookrunError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_config_fails_closed() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("hookrun.toml"),
            "[[hooks.pre-commit.steps]]\nname = \"bad\"\ncheck = \"echo 'unterminated\"\n",
        )
        .unwrap();
        let err = HookrunConfig::load_from(temp.path(), None, None).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn test_env_key() {
        assert_eq!(
            env_key("HOOKS__PRE_COMMIT__STASH_UNTRACKED"),
            "hooks.pre-commit.stash_untracked"
        );
        assert_eq!(env_key("hooks__commit_msg__fix"), "hooks.commit-msg.fix");
    }
}
