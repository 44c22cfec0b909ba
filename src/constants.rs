// src/constants.rs

use std::time::Duration;

/// The name of the directory (inside the user's config dir) holding toolkit configuration.
pub const CONFIG_DIR_NAME: &str = "shell-toolkit";

/// The name of the optional shell selection file (inside the config dir).
pub const SHELLS_CONFIG_FILENAME: &str = "shells.toml";

/// Shells tried, in order, when neither `SHELL` nor the config file names one.
pub const DEFAULT_FALLBACK_SHELLS: &[&str] = &["/bin/zsh", "/bin/bash", "/bin/ash"];

/// Used when no other shell could be found.
pub const LAST_RESORT_SHELL: &str = "/bin/sh";

/// First sleep after a wait call was interrupted by a signal. Doubles on every retry.
pub const WAIT_INITIAL_BACKOFF: Duration = Duration::from_millis(1);

/// Upper bound for the interrupted-wait backoff.
pub const WAIT_MAX_BACKOFF: Duration = Duration::from_millis(1024);

/// How long a stream pump blocks in `poll(2)` before re-checking its control flags.
pub const PUMP_POLL_TICK: Duration = Duration::from_millis(50);

/// Read buffer size handed to output handlers unless they ask for another one.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Pause before calling a write handler again after it reported more input is pending.
pub const PUMP_WRITE_BACKOFF: Duration = Duration::from_millis(5);

/// How long a reader pump keeps draining after the child exited. A descendant that inherited
/// the stream may keep it open and busy indefinitely.
pub const PUMP_DRAIN_DEADLINE: Duration = Duration::from_millis(500);

/// End-of-file character used when a pseudo-terminal's settings cannot be read (`^D`).
pub const DEFAULT_VEOF: u8 = 0x04;
