// src/system/shell.rs

use crate::constants::{DEFAULT_FALLBACK_SHELLS, LAST_RESORT_SHELL};
use crate::system::command::{CommandOutput, SpawnCmd};
use crate::system::monitor::ExitStatus;
use crate::system::shells_config::{ShellsConfig, load_shells_config};
use crate::system::spawn::{Environment, SpawnContext, SpawnError, Streams};
use std::env;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse shells.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Could not expand '{value}' in shells.toml: {message}")]
    Expand { value: String, message: String },
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Runs argument vectors through a shell's `-c` option.
///
/// Every argument is single-quoted before the words are joined, so the shell sees each one as
/// a single word. This is the one place where shell interpretation happens on purpose: use
/// it for pipelines and redirections, use [`SpawnCmd`] for everything else.
#[derive(Debug, Clone, Default)]
pub struct ShellCmd {
    shell: Option<String>,
    environment: Option<Environment>,
    context: SpawnContext,
}

impl ShellCmd {
    /// A shell command using the default shell (see [`resolve_default_shell`]).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_context(mut self, context: &SpawnContext) -> Self {
        self.context = context.clone();
        self
    }

    /// The shell this command will launch.
    pub fn resolve_shell(&self) -> Result<String, ShellError> {
        match &self.shell {
            Some(shell) => Ok(shell.clone()),
            None => resolve_default_shell(),
        }
    }

    /// Runs `args` in the shell. An empty argument list succeeds without launching anything.
    pub fn run_and_wait<I, S>(&self, args: I, streams: Streams) -> Result<ExitStatus, ShellError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(shell_args) = shell_arguments(args) else {
            return Ok(ExitStatus::Exited(0));
        };
        Ok(self.command()?.run_and_wait(shell_args, streams)?)
    }

    pub async fn run_and_wait_async<I, S>(
        &self,
        args: I,
        streams: Streams,
    ) -> Result<ExitStatus, ShellError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(shell_args) = shell_arguments(args) else {
            return Ok(ExitStatus::Exited(0));
        };
        Ok(self
            .command()?
            .run_and_wait_async(shell_args, streams)
            .await?)
    }

    /// Runs `args` in the shell and collects its output.
    pub fn run_capture<I, S>(&self, args: I, stdin: Option<&str>) -> Result<CommandOutput, ShellError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(shell_args) = shell_arguments(args) else {
            return Ok(empty_output());
        };
        Ok(self.command()?.run_capture(shell_args, stdin)?)
    }

    pub async fn run_capture_async<I, S>(
        &self,
        args: I,
        stdin: Option<&str>,
    ) -> Result<CommandOutput, ShellError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(shell_args) = shell_arguments(args) else {
            return Ok(empty_output());
        };
        Ok(self
            .command()?
            .run_capture_async(shell_args, stdin)
            .await?)
    }

    fn command(&self) -> Result<SpawnCmd, ShellError> {
        let shell = self.resolve_shell()?;
        log::debug!("Using shell '{}'", shell);
        let cmd = SpawnCmd::new(shell).with_context(&self.context);
        Ok(match &self.environment {
            Some(environment) => cmd.with_environment(environment.clone()),
            None => cmd,
        })
    }
}

fn empty_output() -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_status: ExitStatus::Exited(0),
    }
}

/// Wraps `value` in single quotes, escaping embedded single quotes as `'\''`.
pub fn quote_argument(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// `["-c", "'a' 'b' ..."]`, or `None` for an empty argument list.
pub fn shell_arguments<I, S>(args: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = args
        .into_iter()
        .map(|arg| quote_argument(arg.as_ref()))
        .collect();
    if quoted.is_empty() {
        return None;
    }
    Some(vec!["-c".to_string(), quoted.join(" ")])
}

/// Picks the shell used when none is given explicitly.
///
/// Order: the `SHELL` variable, then `shell` from `shells.toml`, then the first existing
/// fallback shell, then `/bin/sh`.
pub fn resolve_default_shell() -> Result<String, ShellError> {
    if let Some(shell) = env::var("SHELL").ok().filter(|s| !s.is_empty()) {
        return Ok(shell);
    }
    let config = load_shells_config()?;
    Ok(select_shell(None, &config, |path| path.exists()))
}

fn select_shell<F>(env_shell: Option<String>, config: &ShellsConfig, exists: F) -> String
where
    F: Fn(&Path) -> bool,
{
    // 1. Environment.
    if let Some(shell) = env_shell.filter(|s| !s.is_empty()) {
        return shell;
    }

    // 2. Preferred shell from the config file.
    if let Some(shell) = config.shell.clone().filter(|s| !s.is_empty()) {
        return shell;
    }

    // 3. First fallback that exists.
    let fallbacks: Vec<&str> = if config.fallback_shells.is_empty() {
        DEFAULT_FALLBACK_SHELLS.to_vec()
    } else {
        config.fallback_shells.iter().map(String::as_str).collect()
    };
    if let Some(shell) = fallbacks.into_iter().find(|s| exists(Path::new(s))) {
        return shell.to_string();
    }

    // 4. Last resort.
    LAST_RESORT_SHELL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::spawn::IoMode;

    #[test]
    fn test_quote_argument_escapes_single_quotes() {
        assert_eq!(quote_argument("plain"), "'plain'");
        assert_eq!(quote_argument("it's"), "'it'\\''s'");
        assert_eq!(quote_argument(""), "''");
    }

    #[test]
    fn test_shell_arguments_wrap_for_dash_c() {
        assert_eq!(
            shell_arguments(["echo", "a b"]),
            Some(vec!["-c".to_string(), "'echo' 'a b'".to_string()])
        );
        assert_eq!(shell_arguments(Vec::<String>::new()), None);
    }

    #[test]
    fn test_select_shell_order() {
        let config = ShellsConfig {
            shell: Some("/opt/fish".to_string()),
            fallback_shells: vec![],
        };
        assert_eq!(
            select_shell(Some("/bin/tcsh".to_string()), &config, |_| true),
            "/bin/tcsh"
        );
        assert_eq!(select_shell(None, &config, |_| true), "/opt/fish");

        let no_preference = ShellsConfig::default();
        assert_eq!(
            select_shell(None, &no_preference, |p| p == Path::new("/bin/bash")),
            "/bin/bash"
        );
        assert_eq!(select_shell(None, &no_preference, |_| false), "/bin/sh");

        let custom = ShellsConfig {
            shell: None,
            fallback_shells: vec!["/x/one".to_string(), "/x/two".to_string()],
        };
        assert_eq!(
            select_shell(None, &custom, |p| p == Path::new("/x/two")),
            "/x/two"
        );
    }

    #[test]
    fn test_echo_through_shell() {
        let output = ShellCmd::new()
            .with_shell("/bin/sh")
            .run_capture(["echo", "Hello World"], None)
            .expect("sh should launch");
        assert!(output.success());
        assert_eq!(output.stdout, "Hello World\n");
    }

    #[test]
    fn test_metacharacters_stay_literal_inside_arguments() {
        let output = ShellCmd::new()
            .with_shell("/bin/sh")
            .run_capture(["echo", "$HOME; it's `quoted`"], None)
            .expect("sh should launch");
        assert_eq!(output.stdout, "$HOME; it's `quoted`\n");
    }

    #[test]
    fn test_empty_command_succeeds_without_spawning() {
        let cmd = ShellCmd::new().with_shell("/definitely/not/a/shell");
        let status = cmd
            .run_and_wait(Vec::<String>::new(), Streams::default())
            .expect("empty command is a no-op");
        assert_eq!(status, ExitStatus::Exited(0));

        let output = cmd
            .run_capture(Vec::<String>::new(), None)
            .expect("empty command is a no-op");
        assert!(output.success());
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_missing_shell_is_a_spawn_error() {
        let result = ShellCmd::new()
            .with_shell("/definitely/not/a/shell")
            .run_capture(["true"], None);
        assert!(matches!(
            result,
            Err(ShellError::Spawn(SpawnError::CommandNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_capture_async_uses_context_mode() {
        let context = SpawnContext::new().with_default_io_mode(IoMode::Pty);
        let output = ShellCmd::new()
            .with_shell("/bin/sh")
            .with_context(&context)
            .run_capture_async(["printf", "%s", "pty"], None)
            .await
            .expect("sh should launch");
        assert_eq!(output.stdout, "pty");
    }
}
