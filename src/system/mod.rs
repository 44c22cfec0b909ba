//! # System Interaction Layer
//!
//! Everything that touches processes and file descriptors lives here. The rest of the crate
//! only sees the [`spawn::Spawn`] builder, [`handle::ProcessHandle`] and the command wrappers.
//!
//! ## Modules
//!
//! - **`monitor`**: `waitpid`-based exit tracking for a child pid, with retry on `EINTR`.
//! - **`pty`**: pseudo-terminal allocation.
//! - **`endpoint`**: pipe/pty endpoint pairs and the pump threads that drive their handlers.
//! - **`handlers`**: ready-made read/write handlers (capture buffers, channels, closures).
//! - **`path`**: executable lookup along `PATH`.
//! - **`spawn`**: the spawn core. Picks pass-through or captured launch and builds the handle.
//! - **`handle`**: the handle returned by a spawn call.
//! - **`command`**: `SpawnCmd`, a program bound to an environment and context.
//! - **`shell`**: `ShellCmd`, which runs quoted argument vectors through `sh -c`.
//! - **`shells_config`**: loading of the optional `shells.toml` file.

pub mod command;
pub mod endpoint;
pub mod handle;
pub mod handlers;
pub mod monitor;
pub mod path;
pub mod pty;
pub mod shell;
pub mod shells_config;
pub mod spawn;
