// src/system/pty.rs

//! Pseudo-terminal allocation.

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::pty::openpty;
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use thiserror::Error;

/// Failure to allocate a pseudo-terminal pair.
#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Could not allocate a pseudo-terminal: {0}")]
    Open(#[source] io::Error),
    #[error("Could not mark the pseudo-terminal close-on-exec: {0}")]
    CloseOnExec(#[source] io::Error),
}

/// An allocated master/slave pair. Both ends are close-on-exec.
#[derive(Debug)]
pub(crate) struct Pty {
    pub(crate) master: File,
    pub(crate) slave: File,
}

/// Allocates a new pseudo-terminal with default settings.
///
/// On any failure both descriptors are closed before returning.
pub(crate) fn open() -> Result<Pty, PtyError> {
    let pty = openpty(None, None).map_err(|e| PtyError::Open(e.into()))?;
    set_cloexec(&pty.master).map_err(PtyError::CloseOnExec)?;
    set_cloexec(&pty.slave).map_err(PtyError::CloseOnExec)?;

    log::trace!(
        "Allocated pseudo-terminal (master fd {}, slave fd {})",
        pty.master.as_raw_fd(),
        pty.slave.as_raw_fd()
    );
    Ok(Pty {
        master: File::from(pty.master),
        slave: File::from(pty.slave),
    })
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok(())
}
