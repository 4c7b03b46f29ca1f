use clap::Parser;
use console::style;
use std::process::ExitCode;

use hookrun::cli::Cli;
use hookrun::error::exit_code_of;
use hookrun::hooks::gate::to_exit_code;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run().await {
        Ok(code) => to_exit_code(code),
        Err(err) => {
            eprintln!("{} {:#}", style("✖").red().bold(), err);
            to_exit_code(exit_code_of(&err))
        }
    }
}
