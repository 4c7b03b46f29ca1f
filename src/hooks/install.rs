//! Writing and removing the scripts git calls

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HookrunError;
use crate::git::GitRepo;

/// Line identifying a script as ours
pub const MARKER: &str = "# installed by hookrun";

/// Suffix a replaced foreign hook is kept under
const BACKUP_SUFFIX: &str = "pre-hookrun";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallAction {
    Installed,
    Updated,
    /// A foreign hook was moved aside to the given path
    Replaced { backup: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallAction {
    Removed,
    /// The hook that was there before hookrun is back in place
    RestoredBackup,
}

/// Install a script for each hook. Existing hooks that hookrun did not write
/// are left untouched unless `force` is set.
pub fn install(
    repo: &GitRepo,
    hooks: &[String],
    force: bool,
) -> Result<Vec<(String, InstallAction)>, HookrunError> {
    let dir = repo.hooks_dir()?;
    fs::create_dir_all(&dir)?;
    let binary = std::env::current_exe().ok();

    // refuse before touching anything
    if !force {
        for hook in hooks {
            let path = dir.join(hook);
            if path.exists() && !is_ours(&path)? {
                return Err(HookrunError::ForeignHook(path));
            }
        }
    }

    let mut actions = Vec::with_capacity(hooks.len());
    for hook in hooks {
        let path = dir.join(hook);
        let action = if !path.exists() {
            InstallAction::Installed
        } else if is_ours(&path)? {
            InstallAction::Updated
        } else {
            let backup = backup_path(&path);
            fs::rename(&path, &backup)?;
            tracing::info!("moved existing {} hook to {}", hook, backup.display());
            InstallAction::Replaced { backup }
        };

        write_script(&path, &script(hook, binary.as_deref()))?;
        tracing::info!("installed {} hook at {}", hook, path.display());
        actions.push((hook.clone(), action));
    }

    Ok(actions)
}

/// Remove every hook script carrying the marker
pub fn uninstall(repo: &GitRepo) -> Result<Vec<(String, UninstallAction)>, HookrunError> {
    let dir = repo.hooks_dir()?;
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.contains('.'))
        .collect();
    names.sort();

    let mut actions = Vec::new();
    for name in names {
        let path = dir.join(&name);
        if !path.is_file() || !is_ours(&path)? {
            continue;
        }

        fs::remove_file(&path)?;
        let backup = backup_path(&path);
        let action = if backup.is_file() {
            fs::rename(&backup, &path)?;
            UninstallAction::RestoredBackup
        } else {
            UninstallAction::Removed
        };
        tracing::info!("removed {} hook", name);
        actions.push((name, action));
    }

    Ok(actions)
}

/// Whether a hook file was written by hookrun
pub fn is_ours(path: &Path) -> Result<bool, HookrunError> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).contains(MARKER)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

/// Prefer `hookrun` from PATH; fall back to the binary that installed the hook
fn script(hook: &str, binary: Option<&Path>) -> String {
    let fallback = match binary {
        Some(path) => format!(
            "exec {} run {hook} \"$@\"",
            shell_words::quote(&path.to_string_lossy())
        ),
        None => "echo \"hookrun: not found on PATH\" >&2\nexit 127".to_string(),
    };

    format!(
        "#!/bin/sh\n\
         {MARKER}; remove with `hookrun uninstall`\n\
         if command -v hookrun >/dev/null 2>&1; then\n    \
         exec hookrun run {hook} \"$@\"\n\
         fi\n\
         {fallback}\n"
    )
}

fn write_script(path: &Path, content: &str) -> Result<(), HookrunError> {
    fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::init_repo;

    fn hooks(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_install_writes_marked_executable_scripts() {
        let (_temp, repo) = init_repo();
        let actions = install(&repo, &hooks(&["pre-commit", "commit-msg"]), false).unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|(_, a)| *a == InstallAction::Installed));

        let path = repo.hooks_dir().unwrap().join("pre-commit");
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/sh\n"));
        assert!(content.contains(MARKER));
        assert!(content.contains("hookrun run pre-commit \"$@\""));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o111, 0o111);
        }

        let again = install(&repo, &hooks(&["pre-commit"]), false).unwrap();
        assert_eq!(again[0].1, InstallAction::Updated);
    }

    #[test]
    fn test_foreign_hook_needs_force() {
        let (_temp, repo) = init_repo();
        let dir = repo.hooks_dir().unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("pre-commit"), "#!/bin/sh\nexit 0\n").unwrap();

        let err = install(&repo, &hooks(&["pre-commit"]), false).unwrap_err();
        assert!(matches!(err, HookrunError::ForeignHook(_)));
        assert_eq!(fs::read_to_string(dir.join("pre-commit")).unwrap(), "#!/bin/sh\nexit 0\n");

        let actions = install(&repo, &hooks(&["pre-commit"]), true).unwrap();
        assert!(matches!(actions[0].1, InstallAction::Replaced { .. }));
        assert!(is_ours(&dir.join("pre-commit")).unwrap());

        let removed = uninstall(&repo).unwrap();
        assert_eq!(removed, vec![("pre-commit".to_string(), UninstallAction::RestoredBackup)]);
        assert_eq!(fs::read_to_string(dir.join("pre-commit")).unwrap(), "#!/bin/sh\nexit 0\n");
    }

    #[test]
    fn test_uninstall_leaves_foreign_hooks() {
        let (_temp, repo) = init_repo();
        let dir = repo.hooks_dir().unwrap();
        install(&repo, &hooks(&["pre-commit"]), false).unwrap();
        fs::write(dir.join("pre-push"), "#!/bin/sh\nexit 0\n").unwrap();

        let removed = uninstall(&repo).unwrap();
        assert_eq!(removed, vec![("pre-commit".to_string(), UninstallAction::Removed)]);
        assert!(!dir.join("pre-commit").exists());
        assert!(dir.join("pre-push").exists());
    }
}
