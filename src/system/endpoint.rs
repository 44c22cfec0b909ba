// src/system/endpoint.rs

//! Connected stream endpoints (pipe or pseudo-terminal) and the pumps that drive their handlers.
//!
//! One end of a pair is handed to the child as a standard stream; the other end is owned here.
//! Attaching a handler moves the owned end into a dedicated pump thread that waits for
//! readiness with `poll(2)` and calls the handler. The pump is controlled by two flags:
//!
//! - **stop**: detach. The pump returns the owned end so another handler can be attached.
//! - **finish**: the child has exited. Readers drain what is left for at most
//!   [`PUMP_DRAIN_DEADLINE`], writers give up, and the owned end is closed.
//!
//! A pseudo-terminal master is never closed just because its input ran out: that would hang
//! up the slave and discard whatever the child has not read yet. The writer sends the
//! terminal's end-of-file character instead and holds the master until the child is gone.

use crate::CancellationToken;
use crate::constants::{DEFAULT_VEOF, PUMP_DRAIN_DEADLINE, PUMP_POLL_TICK, PUMP_WRITE_BACKOFF};
use crate::system::handlers::{ReadHandler, WriteHandler, WriteProgress};
use crate::system::pty::{self, PtyError};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, SpecialCharacterIndices};
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure to create or drive a [`StreamEndpointPair`].
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Could not create pipe: {0}")]
    Pipe(#[source] io::Error),
    #[error(transparent)]
    Pty(#[from] PtyError),
    #[error("Could not start stream pump thread: {0}")]
    Pump(#[source] io::Error),
    #[error("A {attempted} handler cannot be attached to a stream that carries data {direction}.")]
    WrongDirection {
        attempted: &'static str,
        direction: Direction,
    },
    #[error("The owned endpoint has already been closed.")]
    Closed,
}

/// The OS mechanism connecting the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Anonymous unidirectional pipe.
    Pipe,
    /// Pseudo-terminal; the owned end is the master, the child gets the slave.
    Pty,
}

/// Which way data flows between the child and the owned end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Child output (stdout/stderr): the owned end is read.
    FromChild,
    /// Child input (stdin): the owned end is written.
    ToChild,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromChild => write!(f, "from the child"),
            Self::ToChild => write!(f, "to the child"),
        }
    }
}

#[derive(Debug)]
struct Pump {
    stop: CancellationToken,
    finish: CancellationToken,
    thread: JoinHandle<Option<File>>,
}

/// Two connected stream endpoints, one for this process and one for a child.
#[derive(Debug)]
pub struct StreamEndpointPair {
    kind: EndpointKind,
    direction: Direction,
    owned: Option<File>,
    child: Option<OwnedFd>,
    pump: Option<Pump>,
}

impl StreamEndpointPair {
    /// Creates a connected pair. Both descriptors are close-on-exec; the child end is made
    /// inheritable only when it is installed as a standard stream.
    pub fn create(kind: EndpointKind, direction: Direction) -> Result<Self, EndpointError> {
        let (owned, child) = match kind {
            EndpointKind::Pipe => {
                let (reader, writer) = io::pipe().map_err(EndpointError::Pipe)?;
                match direction {
                    Direction::FromChild => (File::from(OwnedFd::from(reader)), writer.into()),
                    Direction::ToChild => (File::from(OwnedFd::from(writer)), reader.into()),
                }
            }
            EndpointKind::Pty => {
                let pty = pty::open()?;
                (pty.master, OwnedFd::from(pty.slave))
            }
        };
        log::trace!(
            "Created {:?} endpoint pair ({}), owned fd {}",
            kind,
            direction,
            owned.as_raw_fd()
        );

        Ok(Self {
            kind,
            direction,
            owned: Some(owned),
            child: Some(child),
            pump: None,
        })
    }

    /// Pipe or pty.
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Which way data flows.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Hands out the child's end. Can only be taken once; the caller must drop its copy as
    /// soon as the child has been created, or readers never see end-of-file.
    pub fn take_child_endpoint(&mut self) -> Option<OwnedFd> {
        self.child.take()
    }

    /// Installs (`Some`) or removes (`None`) the handler fed by this pair's output.
    pub fn set_read_handler(
        &mut self,
        handler: Option<Box<dyn ReadHandler>>,
    ) -> Result<(), EndpointError> {
        if self.direction != Direction::FromChild {
            return Err(EndpointError::WrongDirection {
                attempted: "read",
                direction: self.direction,
            });
        }
        self.detach();
        match handler {
            Some(handler) => self.attach(move |file, stop, finish| {
                pump_reader(file, handler, &stop, &finish)
            }),
            None => Ok(()),
        }
    }

    /// Installs (`Some`) or removes (`None`) the handler that feeds this pair's input.
    pub fn set_write_handler(
        &mut self,
        handler: Option<Box<dyn WriteHandler>>,
    ) -> Result<(), EndpointError> {
        if self.direction != Direction::ToChild {
            return Err(EndpointError::WrongDirection {
                attempted: "write",
                direction: self.direction,
            });
        }
        self.detach();
        let kind = self.kind;
        match handler {
            Some(handler) => self.attach(move |file, stop, finish| {
                pump_writer(file, handler, kind, &stop, &finish)
            }),
            None => Ok(()),
        }
    }

    /// Stops the current handler, if any, and takes the owned end back.
    ///
    /// Blocks until the pump has noticed the stop flag (at most one poll tick, unless the
    /// handler itself is blocked).
    pub fn detach(&mut self) {
        let Some(pump) = self.pump.take() else {
            return;
        };
        pump.stop.store(true, Ordering::SeqCst);
        match pump.thread.join() {
            Ok(file) => self.owned = file,
            Err(_) => log::warn!("Stream pump thread panicked while detaching."),
        }
    }

    /// Tells the pump the child has exited, without waiting for it.
    pub fn signal_finish(&self) {
        if let Some(pump) = &self.pump {
            pump.finish.store(true, Ordering::SeqCst);
        }
    }

    /// Lets the pump drain and stop, then closes the owned end.
    pub fn finish(&mut self) {
        self.child = None;
        if let Some(pump) = self.pump.take() {
            pump.finish.store(true, Ordering::SeqCst);
            if pump.thread.join().is_err() {
                log::warn!("Stream pump thread panicked while finishing.");
            }
        }
        self.owned = None;
    }

    fn attach<P>(&mut self, pump: P) -> Result<(), EndpointError>
    where
        P: FnOnce(File, CancellationToken, CancellationToken) -> Option<File> + Send + 'static,
    {
        let file = self.owned.take().ok_or(EndpointError::Closed)?;
        let stop: CancellationToken = Arc::new(AtomicBool::new(false));
        let finish: CancellationToken = Arc::new(AtomicBool::new(false));

        let thread = {
            let stop = Arc::clone(&stop);
            let finish = Arc::clone(&finish);
            thread::Builder::new()
                .name(format!("stream-pump-{}", file.as_raw_fd()))
                .spawn(move || pump(file, stop, finish))
                .map_err(EndpointError::Pump)?
        };

        self.pump = Some(Pump {
            stop,
            finish,
            thread,
        });
        Ok(())
    }
}

impl Drop for StreamEndpointPair {
    fn drop(&mut self) {
        // The pump closes the owned end itself once it sees the flag.
        if let Some(pump) = &self.pump {
            pump.stop.store(true, Ordering::SeqCst);
        }
    }
}

// --- Pumps ---

fn pump_reader(
    mut file: File,
    mut handler: Box<dyn ReadHandler>,
    stop: &AtomicBool,
    finish: &AtomicBool,
) -> Option<File> {
    let mut buf = vec![0u8; handler.chunk_size().max(1)];
    let mut drain_until: Option<Instant> = None;

    loop {
        if stop.load(Ordering::SeqCst) {
            return Some(file);
        }
        // Sampled before polling: an idle tick only ends the pump once finish was requested.
        let draining = finish.load(Ordering::SeqCst);
        if draining {
            let deadline = *drain_until.get_or_insert_with(|| Instant::now() + PUMP_DRAIN_DEADLINE);
            if Instant::now() >= deadline {
                log::debug!(
                    "fd {} is still open {:?} after the child exited; closing it.",
                    file.as_raw_fd(),
                    PUMP_DRAIN_DEADLINE
                );
                break;
            }
        }

        match wait_ready(&file, PollFlags::POLLIN, PUMP_POLL_TICK) {
            Ok(true) => {}
            Ok(false) if draining => break,
            Ok(false) => continue,
            Err(e) => {
                log::debug!("poll on fd {} failed: {}", file.as_raw_fd(), e);
                break;
            }
        }

        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Some(chunk) = buf.get(..n) {
                    handler.on_output(chunk);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock => {}
            // A pty master reports EIO once the slave side is gone.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
            Err(e) => {
                log::debug!("read on fd {} failed: {}", file.as_raw_fd(), e);
                break;
            }
        }
    }

    handler.on_eof();
    None
}

fn pump_writer(
    mut file: File,
    mut handler: Box<dyn WriteHandler>,
    kind: EndpointKind,
    stop: &AtomicBool,
    finish: &AtomicBool,
) -> Option<File> {
    let mut last_written: Option<u8> = None;

    loop {
        if stop.load(Ordering::SeqCst) {
            return Some(file);
        }
        if finish.load(Ordering::SeqCst) {
            return None;
        }

        match wait_ready(&file, PollFlags::POLLOUT, PUMP_POLL_TICK) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                log::debug!("poll on fd {} failed: {}", file.as_raw_fd(), e);
                return None;
            }
        }

        let mut tracked = TrackLastByte {
            inner: &mut file,
            last: last_written,
        };
        let progress = handler.on_writable(&mut tracked);
        last_written = tracked.last;

        match progress {
            Ok(WriteProgress::Pending) => thread::sleep(PUMP_WRITE_BACKOFF),
            Ok(WriteProgress::Finished) if kind == EndpointKind::Pty => {
                if let Err(e) = send_terminal_eof(&mut file, last_written) {
                    log::debug!("Could not send end-of-file on fd {}: {}", file.as_raw_fd(), e);
                }
                return hold_open(file, stop, finish);
            }
            Ok(WriteProgress::Finished) => {
                log::trace!("Write handler finished; closing fd {}", file.as_raw_fd());
                return None;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                log::debug!("Child closed its input (fd {}).", file.as_raw_fd());
                return None;
            }
            Err(e) => {
                log::debug!("write on fd {} failed: {}", file.as_raw_fd(), e);
                return None;
            }
        }
    }
}

/// Passes writes through and remembers the last byte that was accepted.
struct TrackLastByte<'a> {
    inner: &'a mut File,
    last: Option<u8>,
}

impl Write for TrackLastByte<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(byte) = buf.get(..n).and_then(<[u8]>::last) {
            self.last = Some(*byte);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Ends the child's input on a pseudo-terminal in canonical mode.
///
/// The first VEOF hands a partial line to the reader as is; a VEOF at the start of a line
/// reads as end-of-file. Input that stopped mid-line therefore gets two.
fn send_terminal_eof(master: &mut File, last_written: Option<u8>) -> io::Result<()> {
    let veof = termios::tcgetattr(master.as_fd())
        .ok()
        .and_then(|attrs| {
            attrs
                .control_chars
                .get(SpecialCharacterIndices::VEOF as usize)
                .copied()
        })
        .unwrap_or(DEFAULT_VEOF);

    let mid_line = last_written.is_some_and(|byte| byte != b'\n');
    log::trace!(
        "Input on fd {} finished; sending VEOF {:#04x}{}",
        master.as_raw_fd(),
        veof,
        if mid_line { " twice" } else { "" }
    );
    if mid_line {
        master.write_all(&[veof, veof])
    } else {
        master.write_all(&[veof])
    }
}

/// Parks the writer with the master still open until it is detached or the child is gone.
fn hold_open(file: File, stop: &AtomicBool, finish: &AtomicBool) -> Option<File> {
    loop {
        if stop.load(Ordering::SeqCst) {
            return Some(file);
        }
        if finish.load(Ordering::SeqCst) {
            return None;
        }
        thread::sleep(PUMP_POLL_TICK);
    }
}

/// Waits up to `timeout` for `events` on `file`. An interrupted poll counts as "not ready".
fn wait_ready(file: &File, events: PollFlags, timeout: Duration) -> io::Result<bool> {
    let timeout = PollTimeout::from(u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX));
    let mut fds = [PollFd::new(file.as_fd(), events)];
    match poll(&mut fds, timeout) {
        Ok(ready) => Ok(ready > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
