// src/system/spawn.rs

//! The spawn core: resolve a program, build its environment, route its standard streams and
//! hand back a [`ProcessHandle`].
//!
//! Two launch strategies exist and are chosen from the effective [`IoMode`]:
//!
//! - **Pass-through**: all three streams are inherited from this process. Used for programs
//!   that need real terminal control. Stream settings on the [`Spawn`] are ignored.
//! - **Captured**: each stream is configured independently (discard, inherit, or a handler
//!   attached to a pipe or pty pair). The pairs are kept alive by the returned handle.
//!
//! The working directory is always applied per child, never by changing the directory of
//! this process.

use crate::system::endpoint::{Direction, EndpointError, EndpointKind, StreamEndpointPair};
use crate::system::handle::{ProcessHandle, ProcessStatus};
use crate::system::handlers::{ReadHandler, WriteHandler};
use crate::system::monitor::ExitStatus;
use crate::system::path::find_in_path;
use crate::system::pty::PtyError;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Command not found: '{0}'")]
    CommandNotFound(String),
    #[error("'{}' is not an executable file.", .0.display())]
    NotExecutable(PathBuf),
    #[error("Path is too long: '{}'", .0.display())]
    PathTooLong(PathBuf),
    #[error("Permission denied while launching '{0}'.")]
    PermissionDenied(String),
    #[error("Argument list too long for '{0}'.")]
    ArgumentListTooLong(String),
    #[error("Not enough memory to launch '{0}'.")]
    OutOfMemory(String),
    #[error("Executable '{0}' is busy (open for writing).")]
    TextFileBusy(String),
    #[error("Launching '{command}' failed with errno {errno}: {source}")]
    Errno {
        command: String,
        errno: i32,
        #[source]
        source: io::Error,
    },
    #[error("Pseudo-terminal setup failed: {0}")]
    Pty(#[from] PtyError),
    #[error("Stream setup failed: {0}")]
    Stream(#[source] EndpointError),
    #[error("Launching '{command}' failed: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    /// Maps an OS error raised while creating `command` to a named condition.
    /// Unrecognised error numbers are kept verbatim in [`SpawnError::Errno`].
    pub fn from_io(command: &str, err: io::Error) -> Self {
        let command = command.to_string();
        match err.raw_os_error() {
            Some(libc::ENOENT) => Self::CommandNotFound(command),
            Some(libc::EACCES) | Some(libc::EPERM) => Self::PermissionDenied(command),
            Some(libc::E2BIG) => Self::ArgumentListTooLong(command),
            Some(libc::ENOMEM) => Self::OutOfMemory(command),
            Some(libc::ETXTBSY) => Self::TextFileBusy(command),
            Some(libc::ENAMETOOLONG) => Self::PathTooLong(PathBuf::from(command)),
            Some(errno) => Self::Errno {
                command,
                errno,
                source: err,
            },
            None => Self::Io {
                command,
                source: err,
            },
        }
    }
}

impl From<EndpointError> for SpawnError {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Pty(pty) => Self::Pty(pty),
            other => Self::Stream(other),
        }
    }
}

// --- Environment ---

/// How the child's environment is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    /// No variables at all.
    Empty,
    /// A copy of this process's environment.
    #[default]
    Inherit,
    /// Exactly these variables.
    Exact(HashMap<String, String>),
    /// This process's environment plus these variables. On a key collision these win.
    Append(HashMap<String, String>),
}

impl Environment {
    /// Builds the concrete variable set. Called at spawn time, so `Inherit` and `Append`
    /// see the environment as it is at that moment.
    pub fn resolve(&self) -> BTreeMap<OsString, OsString> {
        match self {
            Self::Empty => BTreeMap::new(),
            Self::Inherit => env::vars_os().collect(),
            Self::Exact(vars) => to_os_map(vars),
            Self::Append(vars) => {
                let mut resolved: BTreeMap<OsString, OsString> = env::vars_os().collect();
                resolved.extend(to_os_map(vars));
                resolved
            }
        }
    }
}

fn to_os_map(vars: &HashMap<String, String>) -> BTreeMap<OsString, OsString> {
    vars.iter()
        .map(|(k, v)| (OsString::from(k), OsString::from(v)))
        .collect()
}

// --- I/O mode ---

/// How captured streams are connected to the child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoMode {
    /// All streams are inherited; handlers are not used.
    #[default]
    Passthru,
    /// Handlers are attached through anonymous pipes.
    Pipe,
    /// Handlers are attached through pseudo-terminals.
    Pty,
}

impl IoMode {
    /// The endpoint kind used for handler-backed streams, `None` for pass-through.
    pub fn endpoint_kind(&self) -> Option<EndpointKind> {
        match self {
            Self::Passthru => None,
            Self::Pipe => Some(EndpointKind::Pipe),
            Self::Pty => Some(EndpointKind::Pty),
        }
    }
}

// --- Context ---

/// Defaults shared by many spawn calls. Never mutated in place: the `with_*` methods return
/// a modified copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnContext {
    default_environment: Environment,
    working_directory: Option<PathBuf>,
    default_io_mode: IoMode,
    search_path: Option<OsString>,
}

impl SpawnContext {
    /// Inherit the environment and working directory, pass-through I/O, `PATH` lookup.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_environment(&self) -> &Environment {
        &self.default_environment
    }

    /// `None` means the child starts in this process's current directory.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn default_io_mode(&self) -> IoMode {
        self.default_io_mode
    }

    /// `None` means the `PATH` variable is read at spawn time.
    pub fn search_path(&self) -> Option<&OsStr> {
        self.search_path.as_deref()
    }

    pub fn with_working_directory(&self, dir: impl AsRef<Path>) -> Self {
        Self {
            working_directory: Some(dunce::simplified(dir.as_ref()).to_path_buf()),
            ..self.clone()
        }
    }

    pub fn with_default_io_mode(&self, mode: IoMode) -> Self {
        Self {
            default_io_mode: mode,
            ..self.clone()
        }
    }

    pub fn with_default_environment(&self, environment: Environment) -> Self {
        Self {
            default_environment: environment,
            ..self.clone()
        }
    }

    pub fn with_search_path(&self, search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
            ..self.clone()
        }
    }
}

// --- Stream routing ---

/// Where a child's output stream goes.
pub enum StreamReader {
    /// Connected to the null device.
    Discard,
    /// Shares this process's descriptor.
    Passthru,
    /// Delivered to a handler.
    Reader(Box<dyn ReadHandler>),
}

impl StreamReader {
    /// Boxes `handler` into a [`StreamReader::Reader`].
    pub fn reader(handler: impl ReadHandler + 'static) -> Self {
        Self::Reader(Box::new(handler))
    }
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => write!(f, "Discard"),
            Self::Passthru => write!(f, "Passthru"),
            Self::Reader(_) => write!(f, "Reader(..)"),
        }
    }
}

/// Where a child's input comes from.
pub enum StreamWriter {
    /// The null device.
    Discard,
    /// This process's stdin.
    Passthru,
    /// A handler.
    Writer(Box<dyn WriteHandler>),
}

impl StreamWriter {
    /// Boxes `handler` into a [`StreamWriter::Writer`].
    pub fn writer(handler: impl WriteHandler + 'static) -> Self {
        Self::Writer(Box::new(handler))
    }
}

impl fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => write!(f, "Discard"),
            Self::Passthru => write!(f, "Passthru"),
            Self::Writer(_) => write!(f, "Writer(..)"),
        }
    }
}

/// Routing for the three standard streams.
#[derive(Debug)]
pub struct Streams {
    pub stdin: StreamWriter,
    pub stdout: StreamReader,
    pub stderr: StreamReader,
}

impl Default for Streams {
    fn default() -> Self {
        Self {
            stdin: StreamWriter::Discard,
            stdout: StreamReader::Passthru,
            stderr: StreamReader::Passthru,
        }
    }
}

impl Streams {
    fn has_handlers(&self) -> bool {
        matches!(self.stdin, StreamWriter::Writer(_))
            || matches!(self.stdout, StreamReader::Reader(_))
            || matches!(self.stderr, StreamReader::Reader(_))
    }
}

// --- Spawn ---

/// Describes one child process to launch.
///
/// ```no_run
/// use shell_toolkit::system::handlers::CaptureOutput;
/// use shell_toolkit::system::spawn::{IoMode, Spawn, StreamReader};
///
/// let output = CaptureOutput::new();
/// let status = Spawn::new("echo")
///     .arg("Hello World")
///     .io_mode(IoMode::Pipe)
///     .stdout(StreamReader::reader(output.clone()))
///     .run_and_wait()?;
/// assert!(status.success());
/// assert_eq!(output.string(), "Hello World\n");
/// # Ok::<(), shell_toolkit::system::spawn::SpawnError>(())
/// ```
#[derive(Debug)]
pub struct Spawn {
    command: String,
    args: Vec<String>,
    context: SpawnContext,
    environment: Option<Environment>,
    io_mode: Option<IoMode>,
    streams: Streams,
}

impl Spawn {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            context: SpawnContext::default(),
            environment: None,
            io_mode: None,
            streams: Streams::default(),
        }
    }

    pub fn with_context(mut self, context: &SpawnContext) -> Self {
        self.context = context.clone();
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overrides the context's default environment for this call.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Overrides the context's default I/O mode for this call.
    pub fn io_mode(mut self, mode: IoMode) -> Self {
        self.io_mode = Some(mode);
        self
    }

    pub fn stdin(mut self, stdin: StreamWriter) -> Self {
        self.streams.stdin = stdin;
        self
    }

    pub fn stdout(mut self, stdout: StreamReader) -> Self {
        self.streams.stdout = stdout;
        self
    }

    pub fn stderr(mut self, stderr: StreamReader) -> Self {
        self.streams.stderr = stderr;
        self
    }

    pub fn streams(mut self, streams: Streams) -> Self {
        self.streams = streams;
        self
    }

    /// The I/O mode this call will use.
    pub fn effective_io_mode(&self) -> IoMode {
        self.io_mode.unwrap_or(self.context.default_io_mode)
    }

    /// Launches the child and returns without waiting for it.
    ///
    /// All resolution and creation errors are reported here; once a handle is returned the
    /// only remaining outcome is an exit status.
    pub fn run(self) -> Result<ProcessHandle, SpawnError> {
        let Self {
            command,
            args,
            context,
            environment,
            io_mode,
            streams,
        } = self;

        // 1. Resolve the executable before anything is created.
        let program = find_in_path(&command, context.search_path())?;

        // 2. Build the command line, environment and working directory. argv[0] is the
        //    resolved path.
        let mut process = Command::new(&program);
        process.args(&args).env_clear();
        process.envs(
            environment
                .as_ref()
                .unwrap_or(&context.default_environment)
                .resolve(),
        );
        if let Some(dir) = context.working_directory() {
            process.current_dir(dir);
        }

        // 3. Pick the launch strategy.
        let mode = io_mode.unwrap_or(context.default_io_mode);
        match mode.endpoint_kind() {
            None => {
                if streams.has_handlers() {
                    log::debug!(
                        "Pass-through launch of '{}' ignores the configured stream handlers.",
                        command
                    );
                }
                launch_passthru(&command, process)
            }
            Some(kind) => launch_captured(&command, process, kind, streams),
        }
    }

    /// [`Spawn::run`] followed by a blocking wait.
    pub fn run_and_wait(self) -> Result<ExitStatus, SpawnError> {
        let mut handle = self.run()?;
        Ok(handle.wait())
    }

    /// [`Spawn::run`] followed by a wait that does not block the async runtime.
    pub async fn run_and_wait_async(self) -> Result<ExitStatus, SpawnError> {
        let mut handle = self.run()?;
        Ok(handle.wait_async().await)
    }
}

fn launch_passthru(command: &str, mut process: Command) -> Result<ProcessHandle, SpawnError> {
    process
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let child = process
        .spawn()
        .map_err(|e| SpawnError::from_io(command, e))?;
    log::debug!("Launched '{}' (pid {}) in pass-through mode.", command, child.id());

    // Reaping goes through the pid monitor; the std handle is only used for its pid.
    Ok(ProcessHandle::passthru(child_pid(&child)))
}

fn launch_captured(
    command: &str,
    mut process: Command,
    kind: EndpointKind,
    streams: Streams,
) -> Result<ProcessHandle, SpawnError> {
    let mut endpoints = Vec::new();

    let stdin = match streams.stdin {
        StreamWriter::Discard => Stdio::null(),
        StreamWriter::Passthru => Stdio::inherit(),
        StreamWriter::Writer(handler) => {
            let mut pair = StreamEndpointPair::create(kind, Direction::ToChild)?;
            let child_end = take_child_end(&mut pair)?;
            pair.set_write_handler(Some(handler))?;
            endpoints.push(pair);
            Stdio::from(child_end)
        }
    };
    let stdout = output_stdio(kind, streams.stdout, &mut endpoints)?;
    let stderr = output_stdio(kind, streams.stderr, &mut endpoints)?;
    process.stdin(stdin).stdout(stdout).stderr(stderr);

    let spawned = process.spawn();
    // Closes this process's copies of the child ends, so readers can see end-of-file.
    drop(process);
    let child = spawned.map_err(|e| SpawnError::from_io(command, e))?;
    log::debug!(
        "Launched '{}' (pid {}) with {} captured stream(s) over {:?}.",
        command,
        child.id(),
        endpoints.len(),
        kind
    );

    Ok(ProcessHandle::managed(child_pid(&child), endpoints))
}

/// A pid that does not fit `pid_t` cannot come from this platform; it maps to 0, which the
/// monitor never waits on.
fn child_pid(child: &Child) -> libc::pid_t {
    libc::pid_t::try_from(child.id()).unwrap_or(0)
}

fn output_stdio(
    kind: EndpointKind,
    reader: StreamReader,
    endpoints: &mut Vec<StreamEndpointPair>,
) -> Result<Stdio, SpawnError> {
    Ok(match reader {
        StreamReader::Discard => Stdio::null(),
        StreamReader::Passthru => Stdio::inherit(),
        StreamReader::Reader(handler) => {
            let mut pair = StreamEndpointPair::create(kind, Direction::FromChild)?;
            let child_end = take_child_end(&mut pair)?;
            pair.set_read_handler(Some(handler))?;
            endpoints.push(pair);
            Stdio::from(child_end)
        }
    })
}

fn take_child_end(pair: &mut StreamEndpointPair) -> Result<OwnedFd, SpawnError> {
    pair.take_child_endpoint()
        .ok_or(SpawnError::Stream(EndpointError::Closed))
}
