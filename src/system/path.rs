// src/system/path.rs

use crate::system::spawn::SpawnError;
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Resolves `command` to the path that will be executed.
///
/// - A name containing `/` is taken as a path and must exist and be an executable file.
/// - Any other name is looked up in `search_path` (or the `PATH` variable when `None`), in
///   listed order. An empty entry means the current directory.
/// - If there is no search path at all, the name is returned unchanged.
pub fn find_in_path(command: &str, search_path: Option<&OsStr>) -> Result<PathBuf, SpawnError> {
    if command.is_empty() {
        return Err(SpawnError::CommandNotFound(command.to_string()));
    }

    if command.contains('/') {
        let path = Path::new(command);
        return match fs::metadata(path) {
            Ok(meta) if is_executable(&meta) => Ok(path.to_path_buf()),
            Ok(_) => Err(SpawnError::NotExecutable(path.to_path_buf())),
            Err(e) if e.raw_os_error() == Some(libc::ENAMETOOLONG) => {
                Err(SpawnError::PathTooLong(path.to_path_buf()))
            }
            Err(_) => Err(SpawnError::CommandNotFound(command.to_string())),
        };
    }

    let search: Option<OsString> = search_path
        .map(OsStr::to_os_string)
        .or_else(|| env::var_os("PATH"));
    let Some(search) = search else {
        log::debug!("No search path available; executing '{}' as given.", command);
        return Ok(PathBuf::from(command));
    };

    for dir in env::split_paths(&search) {
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };
        let candidate = dir.join(command);
        if is_executable_file(&candidate) {
            log::trace!("Resolved '{}' to {}", command, candidate.display());
            return Ok(candidate);
        }
    }

    Err(SpawnError::CommandNotFound(command.to_string()))
}

/// The full path of `command` in `PATH`, if any.
pub fn which(command: &str) -> Option<PathBuf> {
    find_in_path(command, None).ok()
}

fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| is_executable(&meta))
}

fn is_executable(meta: &fs::Metadata) -> bool {
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn make_script(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod script");
        path
    }

    #[test]
    fn test_finds_common_program_in_path() {
        let path = find_in_path("sh", None).expect("sh should be in PATH");
        assert!(path.is_absolute());
        assert!(path.ends_with("sh"));
        assert_eq!(which("sh"), Some(path));
    }

    #[test]
    fn test_invented_name_is_not_found() {
        let result = find_in_path("definitely-not-a-real-command-4f2a", None);
        assert!(matches!(result, Err(SpawnError::CommandNotFound(name)) if name == "definitely-not-a-real-command-4f2a"));
    }

    #[test]
    fn test_empty_command_is_not_found() {
        assert!(matches!(
            find_in_path("", None),
            Err(SpawnError::CommandNotFound(_))
        ));
    }

    #[test]
    fn test_custom_search_path_is_used_in_order() {
        let first = tempdir().expect("tempdir");
        let second = tempdir().expect("tempdir");
        make_script(first.path(), "tool", 0o644);
        let expected = make_script(second.path(), "tool", 0o755);

        let search = env::join_paths([first.path(), second.path()]).expect("join paths");
        let found = find_in_path("tool", Some(&search)).expect("tool should resolve");
        assert_eq!(found, expected);
    }

    #[test]
    fn test_explicit_path_must_be_executable_file() {
        let dir = tempdir().expect("tempdir");
        let script = make_script(dir.path(), "run.sh", 0o755);
        let plain = dir.path().join("notes.txt");
        File::create(&plain).expect("create file");

        let script_str = script.to_str().expect("utf-8 path");
        assert_eq!(find_in_path(script_str, None).expect("script"), script);

        let plain_str = plain.to_str().expect("utf-8 path");
        assert!(matches!(
            find_in_path(plain_str, None),
            Err(SpawnError::NotExecutable(p)) if p == plain
        ));

        let dir_str = dir.path().to_str().expect("utf-8 path");
        assert!(matches!(
            find_in_path(dir_str, None),
            Err(SpawnError::NotExecutable(_))
        ));

        let missing = dir.path().join("missing");
        let missing_str = missing.to_str().expect("utf-8 path");
        assert!(matches!(
            find_in_path(missing_str, None),
            Err(SpawnError::CommandNotFound(_))
        ));
    }
}
