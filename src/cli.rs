// src/cli.rs

//! Argument definitions and handlers for the `shtk` binary.

use crate::core::action::{SystemAction, SystemActionFailure};
use crate::core::action_composite::SystemActionComposite;
use crate::core::dir_utility;
use crate::system::command::SpawnCmd;
use crate::system::handlers::OutputCallback;
use crate::system::shell::ShellCmd;
use crate::system::spawn::{
    Environment, IoMode, Spawn, SpawnContext, StreamReader, StreamWriter, Streams,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;

/// shtk: launch programs the way the shell-toolkit library does.
///
/// The exit code of `run`, `sh`, `capture` and `exec` mirrors the child's.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a program directly.
    Run {
        /// How the child's streams are connected.
        #[arg(long, value_enum, default_value_t = IoModeArg::Passthru)]
        io: IoModeArg,

        /// Working directory of the child.
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Start the child with an empty environment.
        #[arg(long)]
        env_empty: bool,

        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run words through the user's shell. Each word is quoted, so no expansion happens.
    Sh {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Run a program and print what it wrote once it exits.
    Capture {
        /// Text written to the child's stdin.
        #[arg(long)]
        stdin: Option<String>,

        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the full path of an executable.
    Which { name: String },

    /// Run a command as a system action.
    Exec {
        /// Only print what would be run.
        #[arg(long)]
        dry_run: bool,

        /// Print the command before running it.
        #[arg(long)]
        verbose: bool,

        #[arg(long)]
        cwd: Option<PathBuf>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IoModeArg {
    Passthru,
    Pipe,
    Pty,
}

impl From<IoModeArg> for IoMode {
    fn from(value: IoModeArg) -> Self {
        match value {
            IoModeArg::Passthru => IoMode::Passthru,
            IoModeArg::Pipe => IoMode::Pipe,
            IoModeArg::Pty => IoMode::Pty,
        }
    }
}

/// Dispatches a parsed command line. Returns the exit code for the process.
pub fn run_cli(cli: Cli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    match cli.command {
        Command::Run {
            io,
            cwd,
            env_empty,
            command,
            args,
        } => handle_run(io.into(), cwd, env_empty, &command, args),
        Command::Sh { words } => {
            let status = ShellCmd::new()
                .run_and_wait(words, Streams::default())
                .context("Could not run shell command")?;
            Ok(status.code())
        }
        Command::Capture {
            stdin,
            command,
            args,
        } => {
            let output = SpawnCmd::new(command.as_str())
                .run_capture(args, stdin.as_deref())
                .with_context(|| format!("Could not run '{}'", command))?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            io::stdout().flush()?;
            Ok(output.exit_code())
        }
        Command::Which { name } => match dir_utility::executable_path(&name) {
            Some(path) => {
                println!("{}", path.display());
                Ok(0)
            }
            None => bail!("'{}' was not found in PATH", name),
        },
        Command::Exec {
            dry_run,
            verbose,
            cwd,
            command,
        } => {
            let actions = SystemActionComposite::for_modes(dry_run, verbose);
            match actions.run_and_print(cwd.as_deref(), &command) {
                Ok(()) => Ok(0),
                Err(SystemActionFailure::NonZeroExit { code, .. }) => Ok(code),
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn handle_run(
    mode: IoMode,
    cwd: Option<PathBuf>,
    env_empty: bool,
    command: &str,
    args: Vec<String>,
) -> Result<i32> {
    let mut spawn = Spawn::new(command).args(args).io_mode(mode);
    if env_empty {
        spawn = spawn.environment(Environment::Empty);
    }
    if let Some(dir) = cwd {
        spawn = spawn.with_context(&SpawnContext::new().with_working_directory(dir));
    }

    // Captured modes forward the child's output chunk by chunk.
    if mode != IoMode::Passthru {
        spawn = spawn
            .stdin(StreamWriter::Passthru)
            .stdout(StreamReader::reader(OutputCallback::new(|chunk: &[u8]| {
                let mut out = io::stdout().lock();
                if let Err(e) = out.write_all(chunk).and_then(|()| out.flush()) {
                    log::warn!("Could not forward child output: {}", e);
                }
            })))
            .stderr(StreamReader::reader(OutputCallback::new(|chunk: &[u8]| {
                if let Err(e) = io::stderr().write_all(chunk) {
                    log::warn!("Could not forward child output: {}", e);
                }
            })));
    }

    let status = spawn
        .run_and_wait()
        .with_context(|| format!("Could not run '{}'", command))?;
    log::debug!("'{}' finished: {}", command, status);
    Ok(status.code())
}
