// src/core/dir_utility.rs

//! Small filesystem conveniences used by command-line tools.
//!
//! Type checks (`is_file`, `is_directory`, ...) never fail: any problem resolving the path
//! answers `false`. They look at the path itself, not at a symlink's target.

use crate::system::path;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DirUtilityError {
    #[error("The path '{}' does not exist.", .0.display())]
    PathDoesNotExist(PathBuf),
    #[error("Filesystem Error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// `true` if `path` exists and is not a directory.
pub fn is_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| !meta.is_dir())
}

/// `true` if `path` exists and is a regular file.
pub fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file())
}

/// `true` if `path` exists and is a directory.
pub fn is_directory(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
}

/// `true` if something exists at `path`. A dangling symlink does not count.
pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Removes a file, symlink or whole directory tree.
pub fn remove_item(path: &Path) -> io::Result<()> {
    if is_directory(path) {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Full path of `executable`. Names that already contain `/` are returned unchanged.
pub fn executable_path(executable: &str) -> Option<PathBuf> {
    if executable.contains('/') {
        return Some(PathBuf::from(executable));
    }
    path::which(executable)
}

pub fn is_executable_in_path(executable: &str) -> bool {
    executable_path(executable).is_some()
}

/// Creates a new, uniquely named directory under the system temp dir. The caller owns it.
pub fn create_temporary_directory() -> io::Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("{}.", process_name()))
        .tempdir()?;
    Ok(dir.keep())
}

/// Runs `block` inside a fresh temporary directory, which is removed afterwards.
///
/// `block` receives `(original_dir, temp_dir)`. With `change_working_directory`, the process
/// working directory is switched to the temp dir for the duration of the block and restored
/// afterwards, even when the block fails. The working directory is process-wide: do not
/// use that mode while other threads depend on it.
pub fn in_temporary_directory<T, F>(change_working_directory: bool, block: F) -> Result<T>
where
    F: FnOnce(&Path, &Path) -> Result<T>,
{
    let temp_dir = tempfile::Builder::new()
        .prefix(&format!("{}.", process_name()))
        .tempdir()
        .context("Could not create temporary directory")?;
    let original_dir = env::current_dir().context("Could not read current directory")?;

    if !change_working_directory {
        return block(&original_dir, temp_dir.path());
    }

    env::set_current_dir(temp_dir.path()).with_context(|| {
        format!("Could not change directory to {}", temp_dir.path().display())
    })?;
    let _restore = scopeguard::guard(original_dir.clone(), |dir| {
        if let Err(e) = env::set_current_dir(&dir) {
            log::warn!("Could not restore working directory {}: {}", dir.display(), e);
        }
    });

    block(&original_dir, temp_dir.path())
}

/// Renames every file and directory below `root` whose name contains `from`, replacing it
/// with `to`. `root` itself is never renamed. Returns the number of renamed items.
pub fn rename_items_containing(from: &str, to: &str, root: &Path) -> Result<usize, DirUtilityError> {
    if !root.exists() {
        return Err(DirUtilityError::PathDoesNotExist(root.to_path_buf()));
    }

    // Children come before their parent, so renaming never invalidates a pending path.
    let entries = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let mut renamed = 0;
    for entry in entries {
        let name = entry.file_name().to_string_lossy();
        if !name.contains(from) {
            continue;
        }
        let new_name = name.replace(from, to);
        let target = entry.path().with_file_name(&new_name);
        log::debug!("Renaming {} -> {}", entry.path().display(), target.display());
        fs::rename(entry.path(), &target)?;
        renamed += 1;
    }
    Ok(renamed)
}

/// Replaces every occurrence of `from` in a text file. Returns `true` if the file changed.
pub fn replace_in_file(file: &Path, from: &str, to: &str) -> Result<bool, DirUtilityError> {
    let content = fs::read_to_string(file)?;
    if !content.contains(from) {
        return Ok(false);
    }
    fs::write(file, content.replace(from, to))?;
    Ok(true)
}

/// Copies the contents of `from` into the existing directory `to`, skipping `.git`
/// directories. Returns the number of files copied.
pub fn duplicate_files(from: &Path, to: &Path) -> Result<usize, DirUtilityError> {
    if !is_directory(to) {
        return Err(DirUtilityError::PathDoesNotExist(to.to_path_buf()));
    }

    let mut copied = 0;
    let walker = WalkDir::new(from)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn process_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "shell-toolkit".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_type_checks() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        fs::write(&file, "x").expect("write file");
        let missing = dir.path().join("missing");

        assert!(is_file(&file));
        assert!(is_regular_file(&file));
        assert!(!is_directory(&file));
        assert!(is_directory(dir.path()));
        assert!(!is_file(dir.path()));
        assert!(file_exists(&file));
        assert!(!file_exists(&missing));
        assert!(!is_file(&missing) && !is_directory(&missing));
    }

    #[test]
    fn test_executable_lookup() {
        assert!(is_executable_in_path("sh"));
        assert!(!is_executable_in_path("definitely-not-a-command-7d1"));
        assert_eq!(
            executable_path("./local/tool"),
            Some(PathBuf::from("./local/tool"))
        );
    }

    #[test]
    fn test_rename_items_containing_renames_depth_first() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("FromDir/Inner")).expect("create dirs");
        fs::write(root.join("FromDir/FileFromName.txt"), "x").expect("write file");
        fs::write(root.join("FromDir/Inner/plain.txt"), "y").expect("write file");

        let renamed = rename_items_containing("From", "To", root).expect("rename");
        assert_eq!(renamed, 2);
        assert!(root.join("ToDir/FileToName.txt").is_file());
        assert!(root.join("ToDir/Inner/plain.txt").is_file());
        assert!(!root.join("FromDir").exists());
    }

    #[test]
    fn test_replace_in_file() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("Cargo.toml");
        fs::write(&file, "name = \"template\"\n").expect("write file");

        assert!(replace_in_file(&file, "template", "widget").expect("replace"));
        assert!(!replace_in_file(&file, "template", "widget").expect("replace again"));
        assert_eq!(
            fs::read_to_string(&file).expect("read file"),
            "name = \"widget\"\n"
        );
    }

    #[test]
    fn test_duplicate_files_skips_git() {
        let src = tempdir().expect("tempdir");
        let dst = tempdir().expect("tempdir");
        fs::create_dir_all(src.path().join(".git/objects")).expect("create .git");
        fs::write(src.path().join(".git/HEAD"), "ref").expect("write HEAD");
        fs::create_dir_all(src.path().join("src")).expect("create src");
        fs::write(src.path().join("src/main.rs"), "fn main() {}").expect("write main");

        let copied = duplicate_files(src.path(), dst.path()).expect("duplicate");
        assert_eq!(copied, 1);
        assert!(dst.path().join("src/main.rs").is_file());
        assert!(!dst.path().join(".git").exists());
    }

    #[test]
    fn test_temporary_directory_helpers() {
        let created = create_temporary_directory().expect("create temp dir");
        assert!(created.is_dir());
        fs::remove_dir(&created).expect("cleanup");

        let mut seen = PathBuf::new();
        let result: Result<()> = in_temporary_directory(false, |_original, temp| {
            seen = temp.to_path_buf();
            assert!(temp.is_dir());
            anyhow::bail!("block failed")
        });
        assert!(result.is_err());
        assert!(!seen.exists());
    }
}
