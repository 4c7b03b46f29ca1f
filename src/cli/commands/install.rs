use anyhow::Result;
use clap::Args;

use super::Session;
use crate::config::{KNOWN_HOOKS, PRE_COMMIT};
use crate::error::HookrunError;
use crate::hooks::install::{self, InstallAction};

#[derive(Args)]
pub struct InstallArgs {
    /// Specify which hooks to install (default: every configured hook)
    #[arg(long, value_delimiter = ',')]
    pub hooks: Option<Vec<String>>,

    /// Replace existing hooks not installed by hookrun
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: InstallArgs, session: &Session) -> Result<i32> {
    let output = &session.output;

    let hooks = match args.hooks {
        Some(hooks) => hooks,
        None => {
            let configured = session.config.configured_hooks();
            if configured.is_empty() {
                vec![PRE_COMMIT.to_string()]
            } else {
                configured
            }
        }
    };
    if let Some(unknown) = hooks.iter().find(|h| !KNOWN_HOOKS.contains(&h.as_str())) {
        return Err(HookrunError::Config(format!("unknown hook '{unknown}'")).into());
    }

    for (hook, action) in install::install(&session.repo, &hooks, args.force)? {
        match action {
            InstallAction::Installed => output.success(&format!("installed {hook}")),
            InstallAction::Updated => output.success(&format!("updated {hook}")),
            InstallAction::Replaced { backup } => output.warning(&format!(
                "replaced existing {hook}; the old hook was moved to {}",
                backup.display()
            )),
        }
    }

    Ok(0)
}
