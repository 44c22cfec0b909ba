// src/core/action_real.rs

use crate::core::action::{
    RemoveItemOptions, SystemAction, SystemActionFailure, SystemActionHeading,
    SystemActionOutput, display_command,
};
use crate::core::dir_utility;
use crate::system::command::SpawnCmd;
use crate::system::spawn::{SpawnContext, Streams};
use std::fs;
use std::path::Path;

/// Performs every action for real.
#[derive(Debug, Clone, Default)]
pub struct SystemActionReal {
    context: SpawnContext,
}

impl SystemActionReal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands are launched with `context` (a working directory passed to a call still wins).
    pub fn with_context(context: &SpawnContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub fn context(&self) -> &SpawnContext {
        &self.context
    }

    fn context_for(&self, working_dir: Option<&Path>) -> SpawnContext {
        match working_dir {
            Some(dir) => self.context.with_working_directory(dir),
            None => self.context.clone(),
        }
    }
}

impl SystemAction for SystemActionReal {
    fn heading(&self, kind: SystemActionHeading, text: &str) {
        log::debug!("{:?}: {}", kind, text);
    }

    fn create_directory(&self, path: &Path) -> Result<(), SystemActionFailure> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn create_file(&self, path: &Path, content: &str) -> Result<(), SystemActionFailure> {
        // Replace rather than truncate, so a symlink at `path` is not written through.
        if fs::symlink_metadata(path).is_ok_and(|meta| !meta.is_dir()) {
            fs::remove_file(path)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn remove_item(
        &self,
        path: &Path,
        options: RemoveItemOptions,
    ) -> Result<(), SystemActionFailure> {
        if !options.remove_file && !options.remove_directory {
            return Err(SystemActionFailure::NothingToRemove);
        }

        if !dir_utility::file_exists(path) {
            if options.ignore_if_not_exist {
                return Ok(());
            }
            return Err(SystemActionFailure::PathDoesNotExist(path.to_path_buf()));
        }

        if options.remove_file && !options.remove_directory && !dir_utility::is_file(path) {
            return Err(SystemActionFailure::AttemptToRemoveDirectory(
                path.to_path_buf(),
            ));
        }
        if options.remove_directory && !options.remove_file && !dir_utility::is_directory(path) {
            return Err(SystemActionFailure::AttemptToRemoveFile(path.to_path_buf()));
        }

        dir_utility::remove_item(path)?;
        Ok(())
    }

    fn run_and_print(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
    ) -> Result<(), SystemActionFailure> {
        let (program, args) = command
            .split_first()
            .ok_or(SystemActionFailure::EmptyCommand)?;

        let status = SpawnCmd::new(program.as_str())
            .with_context(&self.context_for(working_dir))
            .run_and_wait(args.iter().cloned(), Streams::default())?;

        if !status.success() {
            return Err(SystemActionFailure::NonZeroExit {
                command: display_command(command),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn run(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
        stdin: Option<&str>,
    ) -> SystemActionOutput {
        let Some((program, args)) = command.split_first() else {
            return SystemActionOutput::new("", SystemActionFailure::EmptyCommand.to_string(), -1);
        };

        let result = SpawnCmd::new(program.as_str())
            .with_context(&self.context_for(working_dir))
            .run_capture(args.iter().cloned(), stdin);

        match result {
            Ok(output) => SystemActionOutput::new(output.stdout, output.stderr, output.exit_status.code()),
            Err(e) => {
                log::debug!("Could not run '{}': {}", display_command(command), e);
                SystemActionOutput::new("", e.to_string(), -1)
            }
        }
    }

    fn execute_block(
        &self,
        description: Option<&str>,
        block: &mut dyn FnMut() -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if let Some(description) = description {
            log::debug!("Executing block: {}", description);
        }
        block()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_and_remove_items() {
        let dir = tempdir().expect("tempdir");
        let action = SystemActionReal::new();

        let nested = dir.path().join("a/b");
        action.create_directory(&nested).expect("create dirs");
        assert!(nested.is_dir());

        let file = nested.join("notes.txt");
        action.create_file(&file, "first").expect("create file");
        action.create_file(&file, "second").expect("overwrite file");
        assert_eq!(fs::read_to_string(&file).expect("read file"), "second");

        assert!(matches!(
            action.remove_item(&file, RemoveItemOptions::directories_only()),
            Err(SystemActionFailure::AttemptToRemoveFile(_))
        ));
        assert!(matches!(
            action.remove_item(&nested, RemoveItemOptions::files_only()),
            Err(SystemActionFailure::AttemptToRemoveDirectory(_))
        ));

        action
            .remove_item(&file, RemoveItemOptions::files_only())
            .expect("remove file");
        assert!(!file.exists());
        action
            .remove_item_default(&dir.path().join("a"))
            .expect("remove tree");
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn test_remove_missing_item_respects_ignore_flag() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        let action = SystemActionReal::new();

        action
            .remove_item_default(&missing)
            .expect("missing path is ignored");

        let strict = RemoveItemOptions {
            ignore_if_not_exist: false,
            ..RemoveItemOptions::default()
        };
        assert!(matches!(
            action.remove_item(&missing, strict),
            Err(SystemActionFailure::PathDoesNotExist(_))
        ));
    }

    #[test]
    fn test_remove_with_nothing_selected_fails() {
        let dir = tempdir().expect("tempdir");
        let options = RemoveItemOptions {
            ignore_if_not_exist: true,
            remove_file: false,
            remove_directory: false,
        };
        assert!(matches!(
            SystemActionReal::new().remove_item(dir.path(), options),
            Err(SystemActionFailure::NothingToRemove)
        ));
    }

    #[test]
    fn test_run_captures_output_in_working_dir() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("marker.txt"), "").expect("write marker");

        let output = SystemActionReal::new().run(Some(dir.path()), &words(&["ls"]), None);
        assert!(output.is_success());
        assert!(output.stdout.contains("marker.txt"));
    }

    #[test]
    fn test_run_feeds_stdin() {
        let output = SystemActionReal::new().run_command(&words(&["tr", "a-z", "A-Z"]), Some("hello world"));
        assert_eq!(output, SystemActionOutput::new("HELLO WORLD", "", 0));
    }

    #[test]
    fn test_run_reports_launch_failure_in_output() {
        let output = SystemActionReal::new().run_command(&words(&["definitely-not-a-command-91c"]), None);
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("definitely-not-a-command-91c"));

        let empty = SystemActionReal::new().run_command(&[], None);
        assert_eq!(empty.exit_code, -1);
    }

    #[test]
    fn test_run_and_print_treats_non_zero_exit_as_error() {
        let action = SystemActionReal::new();
        action
            .run_and_print(None, &words(&["true"]))
            .expect("true succeeds");

        let result = action.run_and_print(None, &words(&["sh", "-c", "exit 3"]));
        assert!(matches!(
            result,
            Err(SystemActionFailure::NonZeroExit { code: 3, .. })
        ));
        assert!(matches!(
            action.run_and_print(None, &[]),
            Err(SystemActionFailure::EmptyCommand)
        ));
    }

    #[test]
    fn test_execute_block_runs_block() {
        let mut ran = false;
        SystemActionReal::new()
            .execute_block(Some("flip flag"), &mut || {
                ran = true;
                Ok(())
            })
            .expect("block succeeds");
        assert!(ran);
    }
}
