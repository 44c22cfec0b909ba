// src/core/action.rs

//! The `SystemAction` abstraction: common system-level actions of a command-line tool,
//! separated from how they are carried out.
//!
//! Verbose and dry-run modes fall out of swapping implementations:
//!
//! ```no_run
//! use shell_toolkit::core::action::SystemAction;
//! use shell_toolkit::core::action_composite::SystemActionComposite;
//!
//! let (dry_run, verbose) = (false, true);
//! let actions = SystemActionComposite::for_modes(dry_run, verbose);
//! actions.section("Build");
//! actions.run_and_print(None, &["cargo".to_string(), "build".to_string()])?;
//! # Ok::<(), shell_toolkit::core::action::SystemActionFailure>(())
//! ```

use crate::system::spawn::SpawnError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SystemActionFailure {
    #[error("Remove requested, but no item type specified.")]
    NothingToRemove,
    #[error(
        "Attempted to remove a directory at '{}' when only file removal was specified.",
        .0.display()
    )]
    AttemptToRemoveDirectory(PathBuf),
    #[error(
        "Attempted to remove a file at '{}' when only directory removal was specified.",
        .0.display()
    )]
    AttemptToRemoveFile(PathBuf),
    #[error("The path '{}' does not exist.", .0.display())]
    PathDoesNotExist(PathBuf),
    #[error("Directory '{}' already exists.", .0.display())]
    DirectoryExists(PathBuf),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{command}' exited with a non-zero error code ({code}).")]
    NonZeroExit { command: String, code: i32 },
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("Filesystem Error: {0}")]
    Io(#[from] io::Error),
}

/// Kind of heading announced before a group of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemActionHeading {
    Section,
    Phase,
}

/// What `remove_item` may remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveItemOptions {
    /// A missing path is not an error.
    pub ignore_if_not_exist: bool,
    pub remove_file: bool,
    pub remove_directory: bool,
}

impl Default for RemoveItemOptions {
    fn default() -> Self {
        Self {
            ignore_if_not_exist: true,
            remove_file: true,
            remove_directory: true,
        }
    }
}

impl RemoveItemOptions {
    /// Only regular files (and other non-directories) may be removed.
    pub fn files_only() -> Self {
        Self {
            remove_directory: false,
            ..Self::default()
        }
    }

    /// Only directories may be removed.
    pub fn directories_only() -> Self {
        Self {
            remove_file: false,
            ..Self::default()
        }
    }
}

/// Captured result of [`SystemAction::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemActionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl SystemActionOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Appends both streams; `exit_code` replaces the current one when given.
    pub fn appending(&self, stdout: &str, stderr: &str, exit_code: Option<i32>) -> Self {
        Self {
            stdout: format!("{}{}", self.stdout, stdout),
            stderr: format!("{}{}", self.stderr, stderr),
            exit_code: exit_code.unwrap_or(self.exit_code),
        }
    }
}

/// Common system-level actions of a command-line tool.
pub trait SystemAction: fmt::Debug {
    /// Announces the next group of actions.
    fn heading(&self, kind: SystemActionHeading, text: &str);

    /// Creates a directory and any missing parents.
    fn create_directory(&self, path: &Path) -> Result<(), SystemActionFailure>;

    /// Creates a file with `content`, replacing any existing file.
    fn create_file(&self, path: &Path, content: &str) -> Result<(), SystemActionFailure>;

    fn remove_item(&self, path: &Path, options: RemoveItemOptions)
    -> Result<(), SystemActionFailure>;

    /// Runs `command` (program followed by its arguments) with output going to the terminal.
    /// A non-zero exit is an error.
    fn run_and_print(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
    ) -> Result<(), SystemActionFailure>;

    /// Runs `command` and returns what it printed. Failures to launch are reported in the
    /// output (exit code -1, message on stderr), never as an error.
    fn run(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
        stdin: Option<&str>,
    ) -> SystemActionOutput;

    /// Runs an arbitrary block of work that has no command-line equivalent.
    fn execute_block(
        &self,
        description: Option<&str>,
        block: &mut dyn FnMut() -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;

    fn section(&self, text: &str) {
        self.heading(SystemActionHeading::Section, text);
    }

    fn phase(&self, text: &str) {
        self.heading(SystemActionHeading::Phase, text);
    }

    /// Removes a file or directory; a missing path is not an error.
    fn remove_item_default(&self, path: &Path) -> Result<(), SystemActionFailure> {
        self.remove_item(path, RemoveItemOptions::default())
    }

    /// [`SystemAction::run`] in the current working directory.
    fn run_command(&self, command: &[String], stdin: Option<&str>) -> SystemActionOutput {
        self.run(None, command, stdin)
    }
}

/// A command rendered as a single shell-like line, for messages.
pub fn display_command(command: &[String]) -> String {
    shlex::try_join(command.iter().map(String::as_str)).unwrap_or_else(|_| command.join(" "))
}
