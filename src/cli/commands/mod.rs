use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::cli::Output;
use crate::config::HookrunConfig;
use crate::git::GitRepo;
use crate::hooks::Interrupt;

pub mod check;
pub mod commit;
pub mod config;
pub mod fix;
pub mod install;
pub mod run;
pub mod uninstall;

#[derive(Parser)]
#[command(
    name = "hookrun",
    version = env!("CARGO_PKG_VERSION"),
    about = "Git commit hooks with check/fix steps and exit-code gated commits",
    long_about = "hookrun runs configured check and fix steps against staged files, keeps \
                  unstaged work out of their way, and only commits when every step passes."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pre-commit steps and commit if they all pass
    Commit(commit::CommitArgs),
    /// Run fix commands across the working tree without committing
    Fix(fix::FixArgs),
    /// Run check commands only; nothing is modified
    Check(check::CheckArgs),
    /// Execute a hook the way git does (used by installed hook scripts)
    Run(run::RunArgs),
    /// Install git hook scripts that call hookrun
    Install(install::InstallArgs),
    /// Remove hook scripts installed by hookrun
    Uninstall,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the command and return the process exit code
    pub async fn run(self) -> Result<i32> {
        // Change directory if specified
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
        }

        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);
        let custom = self.config.as_deref();

        match self.command {
            Some(Commands::Commit(args)) => {
                commit::execute(args, &Session::open(custom, output)?).await
            }
            Some(Commands::Fix(args)) => fix::execute(args, &Session::open(custom, output)?).await,
            Some(Commands::Check(args)) => {
                check::execute(args, &Session::open(custom, output)?).await
            }
            Some(Commands::Run(args)) => run::execute(args, &Session::open(custom, output)?).await,
            Some(Commands::Install(args)) => {
                install::execute(args, &Session::open(custom, output)?).await
            }
            Some(Commands::Uninstall) => uninstall::execute(&output).await,
            Some(Commands::Config(args)) => config::execute(args, custom, &output).await,
            None => {
                Cli::command().print_help()?;
                Ok(0)
            }
        }
    }
}

/// Everything a hook-running command needs
pub struct Session {
    pub repo: GitRepo,
    pub config: HookrunConfig,
    pub output: Output,
    pub interrupt: Interrupt,
}

impl Session {
    fn open(custom: Option<&Path>, output: Output) -> Result<Self> {
        let repo = GitRepo::discover().context("Not in a git repository")?;
        let config =
            HookrunConfig::load(repo.root(), custom).context("Failed to load configuration")?;

        let interrupt = Interrupt::new();
        interrupt.listen().context("Failed to install Ctrl-C handler")?;

        Ok(Self {
            repo,
            config,
            output,
            interrupt,
        })
    }

    /// Paths given on the command line, relative to the repository root
    pub fn repo_paths(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let root = self
            .repo
            .root()
            .canonicalize()
            .context("Failed to resolve repository root")?;

        paths
            .iter()
            .map(|path| {
                let absolute = path
                    .canonicalize()
                    .with_context(|| format!("No such file: {}", path.display()))?;
                absolute
                    .strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .with_context(|| format!("{} is outside the repository", path.display()))
            })
            .collect()
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
