use anyhow::{Context, Result};

use crate::cli::Output;
use crate::git::GitRepo;
use crate::hooks::install::{self, UninstallAction};

/// Remove hook scripts carrying the hookrun marker. Needs no configuration.
pub async fn execute(output: &Output) -> Result<i32> {
    let repo = GitRepo::discover().context("Not in a git repository")?;

    let removed = install::uninstall(&repo)?;
    if removed.is_empty() {
        output.info("No hookrun hooks found to remove");
        return Ok(0);
    }

    for (hook, action) in removed {
        match action {
            UninstallAction::Removed => output.success(&format!("removed {hook}")),
            UninstallAction::RestoredBackup => {
                output.success(&format!("removed {hook} and restored the hook it replaced"))
            }
        }
    }

    Ok(0)
}
