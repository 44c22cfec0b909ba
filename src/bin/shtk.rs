// src/bin/shtk.rs

use clap::Parser;
use colored::*;
use shell_toolkit::cli::{Cli, run_cli};

/// Entry point of `shtk`. Sets up logging, dispatches, and turns errors into a red message
/// and exit code 1. Otherwise the child's exit code is passed on.
fn main() {
    env_logger::init();

    match run_cli(Cli::parse()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
