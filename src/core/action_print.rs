// src/core/action_print.rs

use crate::core::action::{
    RemoveItemOptions, SystemAction, SystemActionFailure, SystemActionHeading,
    SystemActionOutput,
};
use colored::{Color, Colorize};
use std::borrow::Cow;
use std::path::Path;

/// Colour and weight applied to one kind of printed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintStyle {
    pub color: Option<Color>,
    pub bold: bool,
}

impl PrintStyle {
    pub const fn bold() -> Self {
        Self {
            color: None,
            bold: true,
        }
    }

    pub const fn bold_color(color: Color) -> Self {
        Self {
            color: Some(color),
            bold: true,
        }
    }

    fn apply(&self, text: &str) -> String {
        let mut styled = text.normal();
        if let Some(color) = self.color {
            styled = styled.color(color);
        }
        if self.bold {
            styled = styled.bold();
        }
        styled.to_string()
    }
}

/// Only prints the actions. Backs dry-run mode, or verbose mode when combined with
/// [`SystemActionReal`](crate::core::action_real::SystemActionReal) in a composite.
#[derive(Debug, Clone)]
pub struct SystemActionPrint {
    /// Set to `false` for plain text.
    pub enable_style: bool,
    pub section_style: PrintStyle,
    pub phase_style: PrintStyle,
    pub create_directory_style: PrintStyle,
    pub create_file_style: PrintStyle,
    pub remove_item_style: PrintStyle,
    pub run_and_print_style: PrintStyle,
}

impl Default for SystemActionPrint {
    fn default() -> Self {
        Self {
            enable_style: true,
            section_style: PrintStyle::bold_color(Color::Yellow),
            phase_style: PrintStyle::bold_color(Color::Cyan),
            create_directory_style: PrintStyle::bold(),
            create_file_style: PrintStyle::bold(),
            remove_item_style: PrintStyle::bold(),
            run_and_print_style: PrintStyle::bold(),
        }
    }
}

impl SystemActionPrint {
    pub fn new() -> Self {
        Self::default()
    }

    /// A printer that emits no escape codes.
    pub fn plain() -> Self {
        Self {
            enable_style: false,
            ..Self::default()
        }
    }

    fn styled(&self, text: &str, style: &PrintStyle) -> String {
        if self.enable_style {
            style.apply(text)
        } else {
            text.to_string()
        }
    }

    fn output(&self, lines: &[String]) {
        for line in lines {
            println!("{}", line);
        }
    }

    // --- Line builders ---

    fn heading_lines(&self, kind: SystemActionHeading, text: &str) -> Vec<String> {
        match kind {
            SystemActionHeading::Section => {
                vec![self.styled(&format!(" == Section: {}", text), &self.section_style)]
            }
            SystemActionHeading::Phase => {
                vec![self.styled(&format!(" -- Phase: {}", text), &self.phase_style)]
            }
        }
    }

    fn create_file_lines(&self, path: &Path, content: &str) -> Vec<String> {
        let mut lines = vec![self.styled(
            &format!(" > Creating file at path: {}", path.display()),
            &self.create_file_style,
        )];
        for line in content.lines() {
            let indented = format!("    {}", line);
            lines.push(if self.enable_style {
                indented.yellow().to_string()
            } else {
                indented
            });
        }
        lines
    }

    fn remove_item_lines(
        &self,
        path: &Path,
        options: RemoveItemOptions,
    ) -> Result<Vec<String>, SystemActionFailure> {
        let what = match (options.remove_file, options.remove_directory) {
            (true, true) => "files/directories",
            (true, false) => "file",
            (false, true) => "directory",
            (false, false) => return Err(SystemActionFailure::NothingToRemove),
        };
        Ok(vec![self.styled(
            &format!(" > Remove {} at path: {}", what, path.display()),
            &self.remove_item_style,
        )])
    }

    fn command_lines(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
        stdin: Option<&str>,
    ) -> Vec<String> {
        let quoted: Vec<Cow<'_, str>> = command.iter().map(|word| quote_word(word)).collect();
        let mut lines = vec![self.styled(
            &format!(" > Executing command: {}", quoted.join(" ")),
            &self.run_and_print_style,
        )];
        if let Some(stdin) = stdin {
            lines.push(self.styled(&format!("   stdin: {}", stdin), &self.run_and_print_style));
        }
        if let Some(dir) = working_dir {
            lines.push(self.styled(
                &format!("   Working Directory: {}", dir.display()),
                &self.run_and_print_style,
            ));
        }
        lines
    }
}

/// Shell-quotes a word for display. Words `shlex` cannot quote (NUL bytes) are shown as-is.
fn quote_word(word: &str) -> Cow<'_, str> {
    shlex::try_quote(word).unwrap_or(Cow::Borrowed(word))
}

impl SystemAction for SystemActionPrint {
    fn heading(&self, kind: SystemActionHeading, text: &str) {
        self.output(&self.heading_lines(kind, text));
    }

    fn create_directory(&self, path: &Path) -> Result<(), SystemActionFailure> {
        self.output(&[self.styled(
            &format!(" > Creating directory at path: {}", path.display()),
            &self.create_directory_style,
        )]);
        Ok(())
    }

    fn create_file(&self, path: &Path, content: &str) -> Result<(), SystemActionFailure> {
        self.output(&self.create_file_lines(path, content));
        Ok(())
    }

    fn remove_item(
        &self,
        path: &Path,
        options: RemoveItemOptions,
    ) -> Result<(), SystemActionFailure> {
        self.output(&self.remove_item_lines(path, options)?);
        Ok(())
    }

    fn run_and_print(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
    ) -> Result<(), SystemActionFailure> {
        self.output(&self.command_lines(working_dir, command, None));
        Ok(())
    }

    fn run(
        &self,
        working_dir: Option<&Path>,
        command: &[String],
        stdin: Option<&str>,
    ) -> SystemActionOutput {
        self.output(&self.command_lines(working_dir, command, stdin));
        SystemActionOutput::default()
    }

    fn execute_block(
        &self,
        description: Option<&str>,
        _block: &mut dyn FnMut() -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if let Some(description) = description {
            self.output(&[self.styled(&format!(" > {}", description), &self.run_and_print_style)]);
        }
        Ok(())
    }
}
