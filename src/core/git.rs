// src/core/git.rs

//! Thin wrapper around the `git` command line.
//!
//! Every call goes through a [`SystemAction`], so dry-run and verbose modes apply to git too.

use crate::core::action::{SystemAction, SystemActionFailure, display_command};
use crate::core::action_real::SystemActionReal;
use crate::core::dir_utility;
use std::path::{Path, PathBuf};

const GIT_EXECUTABLE: &str = "git";

/// Where `initialize_repo` pushes to: `user@host:owner/repo.git`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRemote {
    pub user: String,
    pub host: String,
}

impl Default for GitRemote {
    fn default() -> Self {
        Self {
            user: "git".to_string(),
            host: "github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOption {
    Quiet,
    Verbose,
    Author(String),
    Date(String),
    DryRun,
    AllChangedFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOption {
    Verbose,
    Quiet,
    Progress,
    DryRun,
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOption {
    Verbose,
    Quiet,
    Progress,
    Rebase,
    DryRun,
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashAction {
    List,
    Pop,
    Push,
}

impl StashAction {
    fn as_str(self) -> &'static str {
        match self {
            StashAction::List => "list",
            StashAction::Pop => "pop",
            StashAction::Push => "push",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashOption {
    Quiet,
}

/// Runs `git` subcommands through a [`SystemAction`], optionally in a fixed working directory.
#[derive(Debug)]
pub struct GitCommand {
    action: Box<dyn SystemAction>,
    working_dir: Option<PathBuf>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new(Box::new(SystemActionReal::new()))
    }
}

impl GitCommand {
    pub fn new(action: Box<dyn SystemAction>) -> Self {
        Self {
            action,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Runs `git <args>` with output going to the terminal.
    pub fn run<I, S>(&self, args: I) -> Result<(), SystemActionFailure>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command: Vec<String> = std::iter::once(GIT_EXECUTABLE.to_string())
            .chain(args.into_iter().map(Into::into))
            .collect();
        self.action.run_and_print(self.working_dir(), &command)
    }

    /// Turns the working directory into a repository, commits everything in it and pushes
    /// it to `owner/repo_name` on `remote` as `main`.
    pub fn initialize_repo(
        &self,
        owner: &str,
        repo_name: &str,
        commit_message: Option<&str>,
        remote: &GitRemote,
    ) -> Result<(), SystemActionFailure> {
        let origin = format!("{}@{}:{}/{}.git", remote.user, remote.host, owner, repo_name);

        self.run(["init"])?;
        self.run(["add", "."])?;
        self.run(["commit", "-m", commit_message.unwrap_or("Initial Import")])?;
        self.run(["branch", "--move", "main"])?;
        self.run(["remote", "add", "origin", origin.as_str()])?;
        self.run(["push", "-u", "origin", "main"])
    }

    pub fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<(), SystemActionFailure> {
        self.run(std::iter::once("add").chain(paths.iter().map(AsRef::as_ref)))
    }

    /// Clones `repo` into `outdir`, which git creates. `shallow` clones with `--depth 1`.
    pub fn clone(&self, repo: &str, outdir: &Path, shallow: bool) -> Result<(), SystemActionFailure> {
        if dir_utility::file_exists(outdir) {
            return Err(SystemActionFailure::DirectoryExists(outdir.to_path_buf()));
        }

        let outdir = outdir.to_string_lossy().into_owned();
        let mut args = vec!["clone".to_string()];
        if shallow {
            args.extend(["--depth".to_string(), "1".to_string()]);
        }
        args.extend([repo.to_string(), outdir]);
        self.run(args)
    }

    pub fn commit(&self, message: &str, options: &[CommitOption]) -> Result<(), SystemActionFailure> {
        let mut args = vec!["commit".to_string()];
        for option in options {
            match option {
                CommitOption::Verbose => args.push("--verbose".to_string()),
                CommitOption::Quiet => args.push("--quiet".to_string()),
                CommitOption::Author(author) => {
                    args.extend(["--author".to_string(), author.clone()])
                }
                CommitOption::Date(date) => args.extend(["--date".to_string(), date.clone()]),
                CommitOption::AllChangedFiles => args.push("--all".to_string()),
                CommitOption::DryRun => args.push("--dry-run".to_string()),
            }
        }
        args.extend(["--message".to_string(), message.to_string()]);
        self.run(args)
    }

    pub fn push(&self, options: &[PushOption]) -> Result<(), SystemActionFailure> {
        let flags = options.iter().map(|option| match option {
            PushOption::Verbose => "--verbose",
            PushOption::Quiet => "--quiet",
            PushOption::Progress => "--progress",
            PushOption::DryRun => "--dry-run",
            PushOption::Force => "--force",
        });
        self.run(std::iter::once("push").chain(flags))
    }

    pub fn pull(&self, options: &[PullOption]) -> Result<(), SystemActionFailure> {
        let flags = options.iter().map(|option| match option {
            PullOption::Verbose => "--verbose",
            PullOption::Quiet => "--quiet",
            PullOption::Progress => "--progress",
            PullOption::Rebase => "--rebase",
            PullOption::DryRun => "--dry-run",
            PullOption::Force => "--force",
        });
        self.run(std::iter::once("pull").chain(flags))
    }

    pub fn stash(&self, action: StashAction, options: &[StashOption]) -> Result<(), SystemActionFailure> {
        let flags = options.iter().map(|option| match option {
            StashOption::Quiet => "--quiet",
        });
        self.run(["stash", action.as_str()].into_iter().chain(flags))
    }

    /// Stashes local changes, runs `block`, then restores them.
    ///
    /// The stash is popped only when `git stash push` actually saved something. It is popped
    /// whether or not `block` succeeds; the block's error is returned afterwards.
    pub fn with_stash<T, F>(&self, options: &[StashOption], block: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        let quiet = options.contains(&StashOption::Quiet);
        let mut push_command: Vec<String> = [GIT_EXECUTABLE, "stash", "push"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if quiet {
            push_command.push("--quiet".to_string());
        }

        let pushed = self.action.run(self.working_dir(), &push_command, None);
        if !pushed.is_success() {
            if !quiet {
                print!("{}", pushed.stdout);
            }
            return Err(SystemActionFailure::NonZeroExit {
                command: display_command(&push_command),
                code: pushed.exit_code,
            }
            .into());
        }

        let stashed = !pushed.stdout.to_lowercase().contains("no local changes");
        log::debug!("git stash push saved changes: {}", stashed);

        let result = block();
        if stashed {
            self.stash(StashAction::Pop, options)?;
        }
        result
    }
}
