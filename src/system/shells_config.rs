// src/system/shells_config.rs

use crate::constants::{CONFIG_DIR_NAME, SHELLS_CONFIG_FILENAME};
use crate::system::shell::ShellError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

lazy_static! {
    static ref SHELLS_CONFIG: Mutex<Option<ShellsConfig>> = Mutex::new(None);
}

/// Contents of `shells.toml`.
///
/// ```toml
/// shell = "~/.local/bin/fish"
/// fallback_shells = ["/bin/bash", "/bin/sh"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellsConfig {
    /// Preferred shell, used when `SHELL` is not set.
    pub shell: Option<String>,
    /// Probed in order when no preferred shell is known. Empty means the built-in list.
    pub fallback_shells: Vec<String>,
}

/// `<config dir>/shell-toolkit/shells.toml`, if the platform has a config directory.
pub fn get_shells_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(SHELLS_CONFIG_FILENAME))
}

/// Loads the user's shell configuration.
///
/// This function is memoized: the file is read once per process. A missing file (or a
/// platform without a config directory) yields the default configuration.
pub fn load_shells_config() -> Result<ShellsConfig, ShellError> {
    let mut cached = SHELLS_CONFIG
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(config) = &*cached {
        return Ok(config.clone());
    }

    let config = match get_shells_config_path() {
        Some(path) => load_shells_config_from(&path)?,
        None => {
            log::debug!("No config directory on this platform; using default shells.");
            ShellsConfig::default()
        }
    };
    *cached = Some(config.clone());
    Ok(config)
}

/// Reads and expands a shells file at `path`, bypassing the cache.
pub fn load_shells_config_from(path: &Path) -> Result<ShellsConfig, ShellError> {
    if !path.exists() {
        log::debug!("{} not found; using default shells.", path.display());
        return Ok(ShellsConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let raw: ShellsConfig = toml::from_str(&content)?;

    // `~` and `$VAR` are expanded once, at load time.
    let shell = raw.shell.as_deref().map(expand).transpose()?;
    let fallback_shells = raw
        .fallback_shells
        .iter()
        .map(|s| expand(s))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Loaded shell configuration from {}", path.display());
    Ok(ShellsConfig {
        shell,
        fallback_shells,
    })
}

fn expand(value: &str) -> Result<String, ShellError> {
    shellexpand::full(value)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| ShellError::Expand {
            value: value.to_string(),
            message: e.to_string(),
        })
}
