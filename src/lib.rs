//! # shell-toolkit
//!
//! Wrappers around OS process creation for command-line tools that need to shell out.
//!
//! - **`system`**: the process boundary. Spawns children in pass-through or captured mode,
//!   routes their standard streams through pipes or pseudo-terminals, and reaps exit status.
//! - **`core`**: collaborators built on top of it: the `SystemAction` abstraction (real,
//!   print-only and composite), `git`/`gh` command builders, directory utilities, a console
//!   prompt and a tabular text formatter.
//! - **`cli`**: argument definitions for the `shtk` binary.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Shared stop flag handed to background stream pumps.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod system;
