// src/system/command.rs

use crate::system::handle::ProcessHandle;
use crate::system::handlers::{CaptureOutput, StringInput};
use crate::system::monitor::ExitStatus;
use crate::system::spawn::{
    Environment, IoMode, Spawn, SpawnContext, SpawnError, StreamReader, StreamWriter, Streams,
};

/// Everything a captured run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: ExitStatus,
}

impl CommandOutput {
    /// `true` when the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_status.success()
    }

    /// The exit status as a shell would report it.
    pub fn exit_code(&self) -> i32 {
        self.exit_status.code()
    }
}

/// A program plus the environment and context it is always launched with.
///
/// Arguments are passed through as discrete strings; nothing is interpreted by a shell.
#[derive(Debug, Clone)]
pub struct SpawnCmd {
    command: String,
    environment: Option<Environment>,
    context: SpawnContext,
}

impl SpawnCmd {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            environment: None,
            context: SpawnContext::default(),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_context(mut self, context: &SpawnContext) -> Self {
        self.context = context.clone();
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn context(&self) -> &SpawnContext {
        &self.context
    }

    /// Launches the command with `streams` and returns immediately.
    pub fn run<I, S>(&self, args: I, streams: Streams) -> Result<ProcessHandle, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spawn(args).streams(streams).run()
    }

    pub fn run_and_wait<I, S>(&self, args: I, streams: Streams) -> Result<ExitStatus, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spawn(args).streams(streams).run_and_wait()
    }

    pub async fn run_and_wait_async<I, S>(
        &self,
        args: I,
        streams: Streams,
    ) -> Result<ExitStatus, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spawn(args).streams(streams).run_and_wait_async().await
    }

    /// Runs to completion collecting stdout and stderr, optionally feeding `stdin`.
    ///
    /// Streams cannot be captured in pass-through mode, so a pass-through context is run
    /// over pipes instead.
    pub fn run_capture<I, S>(&self, args: I, stdin: Option<&str>) -> Result<CommandOutput, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (spawn, stdout, stderr) = self.capturing(args, stdin);
        let exit_status = spawn.run_and_wait()?;
        Ok(CommandOutput {
            stdout: stdout.string(),
            stderr: stderr.string(),
            exit_status,
        })
    }

    pub async fn run_capture_async<I, S>(
        &self,
        args: I,
        stdin: Option<&str>,
    ) -> Result<CommandOutput, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (spawn, stdout, stderr) = self.capturing(args, stdin);
        let exit_status = spawn.run_and_wait_async().await?;
        Ok(CommandOutput {
            stdout: stdout.string(),
            stderr: stderr.string(),
            exit_status,
        })
    }

    fn spawn<I, S>(&self, args: I) -> Spawn
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spawn = Spawn::new(self.command.clone())
            .with_context(&self.context)
            .args(args);
        match &self.environment {
            Some(environment) => spawn.environment(environment.clone()),
            None => spawn,
        }
    }

    fn capturing<I, S>(&self, args: I, stdin: Option<&str>) -> (Spawn, CaptureOutput, CaptureOutput)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stdout = CaptureOutput::new();
        let stderr = CaptureOutput::new();

        let mut spawn = self
            .spawn(args)
            .stdout(StreamReader::reader(stdout.clone()))
            .stderr(StreamReader::reader(stderr.clone()));
        if let Some(input) = stdin {
            spawn = spawn.stdin(StreamWriter::writer(StringInput::new(input)));
        }
        if spawn.effective_io_mode() == IoMode::Passthru {
            spawn = spawn.io_mode(IoMode::Pipe);
        }

        (spawn, stdout, stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_run_capture_collects_both_streams() {
        let output = SpawnCmd::new("sh")
            .run_capture(["-c", "printf out; printf err >&2; exit 4"], None)
            .expect("sh should launch");

        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert_eq!(output.exit_status, ExitStatus::Exited(4));
        assert_eq!(output.exit_code(), 4);
        assert!(!output.success());
    }

    #[test]
    fn test_run_capture_feeds_stdin() {
        let output = SpawnCmd::new("tr")
            .run_capture(["a-z", "A-Z"], Some("hello world"))
            .expect("tr should launch");

        assert!(output.success());
        assert_eq!(output.stdout, "HELLO WORLD");
    }

    #[test]
    fn test_environment_is_honoured() {
        let vars = HashMap::from([("SHTK_CMD_VAR".to_string(), "set".to_string())]);
        let output = SpawnCmd::new("sh")
            .with_environment(Environment::Exact(vars))
            .run_capture(["-c", "printf %s \"$SHTK_CMD_VAR\""], None)
            .expect("sh should launch");

        assert_eq!(output.stdout, "set");
    }

    #[test]
    fn test_run_and_wait_reports_exit_status() {
        let cmd = SpawnCmd::new("false");
        assert_eq!(cmd.command(), "false");
        let status = cmd
            .run_and_wait(Vec::<String>::new(), Streams::default())
            .expect("false should launch");
        assert_eq!(status, ExitStatus::Exited(1));
    }

    #[tokio::test]
    async fn test_run_capture_async() {
        let output = SpawnCmd::new("echo")
            .run_capture_async(["-n", "async"], None)
            .await
            .expect("echo should launch");
        assert_eq!(output.stdout, "async");
        assert!(output.success());
    }
}
