//! # hookrun
//!
//! Git commit hooks built from check/fix steps.
//!
//! A hook is a list of steps, each with an optional `check` and `fix` command
//! and a glob selecting the files it applies to. hookrun runs the steps in
//! order against the staged files, stops at the first failure, and only lets
//! a commit through when every step exited 0.
//!
//! Unstaged changes are set aside before any step runs and restored once the
//! steps are done, including when a step fails or hookrun itself errors. A
//! restore that would conflict keeps the stash entry and reports the command
//! that recovers it; work is never dropped silently.
//!
//! ## Quick Start
//!
//! ```bash
//! # hookrun.toml
//! # [[hooks.pre-commit.steps]]
//! # name = "fmt"
//! # glob = "*.rs"
//! # check = "rustfmt --check {{files}}"
//! # fix = "rustfmt {{files}}"
//!
//! hookrun install
//! hookrun commit -m "message"
//! hookrun check --all-files
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hooks;
pub mod shared;

pub use cli::{Cli, Output};
pub use config::HookrunConfig;
pub use error::HookrunError;

/// Result type alias for hookrun operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
