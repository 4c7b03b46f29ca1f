use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::cli::Output;
use crate::config::{ConfigFormat, HookrunConfig};
use crate::git::GitRepo;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration
    Show {
        /// Output format: toml, json, yaml
        #[arg(short, long, default_value = "toml")]
        format: ConfigFormat,
    },
    /// Validate configuration; exits non-zero if any hook is invalid
    Validate,
}

pub async fn execute(args: ConfigArgs, custom: Option<&Path>, output: &Output) -> Result<i32> {
    let config =
        HookrunConfig::load(&config_root()?, custom).context("Failed to load configuration")?;

    match args.command {
        ConfigCommand::Show { format } => {
            println!("{}", config.export_config(format)?.trim_end());
        }
        ConfigCommand::Validate => {
            output.success("configuration is valid");
            for (hook, settings) in &config.hooks {
                output.list_item(&format!("{hook}: {} step(s)", settings.steps.len()));
            }
        }
    }

    Ok(0)
}

/// Repository root when inside one, else the current directory
fn config_root() -> Result<PathBuf> {
    match GitRepo::discover() {
        Ok(repo) => Ok(repo.root().to_path_buf()),
        Err(_) => std::env::current_dir().context("Failed to get current directory"),
    }
}
