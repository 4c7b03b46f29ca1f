//! Command-line interface for hookrun

pub mod commands;
pub mod output;

pub use commands::{Cli, Commands};
pub use output::Output;
