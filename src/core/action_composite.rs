// src/core/action_composite.rs

use crate::core::action::{
    RemoveItemOptions, SystemAction, SystemActionFailure, SystemActionHeading,
    SystemActionOutput,
};
use crate::core::action_print::SystemActionPrint;
use crate::core::action_real::SystemActionReal;
use std::path::Path;

/// Forwards every action to each member, in order. The first failing member stops the call.
#[derive(Debug, Default)]
pub struct SystemActionComposite {
    actions: Vec<Box<dyn SystemAction>>,
}

impl SystemActionComposite {
    pub fn new(actions: Vec<Box<dyn SystemAction>>) -> Self {
        Self { actions }
    }

    /// Standard setup for a tool's `--dry-run` and `--verbose` flags.
    ///
    /// Dry run only prints, verbose prints then performs, otherwise actions are only performed.
    pub fn for_modes(dry_run: bool, verbose: bool) -> Self {
        let actions: Vec<Box<dyn SystemAction>> = if dry_run {
            vec![Box::new(SystemActionPrint::new())]
        } else if verbose {
            vec![
                Box::new(SystemActionPrint::new()),
                Box::new(SystemActionReal::new()),
            ]
        } else {
            vec![Box::new(SystemActionReal::new())]
        };
        Self::new(actions)
    }

    pub fn push(&mut self, action: Box<dyn SystemAction>) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl SystemAction for SystemActionComposite {
    fn heading(&self, kind: SystemActionHeading, text: &str) {
        for action in &self.actions {
            action.heading(kind, text);
        }
    }

    fn create_directory(&self, path: &Path) -> Result<(), SystemActionFailure> {
        for action in &self.actions {
            action.create_directory(path)?;
        }
        Ok(())
    }

    fn create_file(&self, path: &Path, content: &str) -> Result<(), SystemActionFailure> {
        for action in &self.actions {
            action.create_file(path, content)?;
        }
        Ok(())
    }

    fn remove_item(
        &self,
        path: &Path,
        options: RemoveItemOptions,
    ) -> Result<(), SystemActionFailure> {
        for action in &self.actions {
            action.remove_item(path, options)?;
        }
        Ok(())
    }

    fn run_and_print(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
    ) -> Result<(), SystemActionFailure> {
        for action in &self.actions {
            action.run_and_print(working_dir, command)?;
        }
        Ok(())
    }

    /// Outputs of all members are concatenated. The exit code is the last non-zero one.
    fn run(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
        stdin: Option<&str>,
    ) -> SystemActionOutput {
        self.actions
            .iter()
            .fold(SystemActionOutput::default(), |combined, action| {
                let output = action.run(working_dir, command, stdin);
                let code = (!output.is_success()).then_some(output.exit_code);
                combined.appending(&output.stdout, &output.stderr, code)
            })
    }

    fn execute_block(
        &self,
        description: Option<&str>,
        block: &mut dyn FnMut() -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for action in &self.actions {
            action.execute_block(description, block)?;
        }
        Ok(())
    }
}
