// src/core/prompt.rs

//! Single-answer console questions, such as yes/no confirmations.

use colored::{Color, Colorize};
use dialoguer::{Input, theme::ColorfulTheme};
use std::io;

/// Look of a prompt line: a leading marker, then the message, then the allowed answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptStyle {
    pub leading_text: String,
    pub leading_text_color: Color,
    pub message_color: Color,
    pub allowed_response_color: Color,
}

impl PromptStyle {
    pub fn normal() -> Self {
        Self {
            leading_text: "- ".to_string(),
            leading_text_color: Color::White,
            message_color: Color::White,
            allowed_response_color: Color::BrightWhite,
        }
    }

    pub fn error() -> Self {
        Self {
            leading_text: "* ".to_string(),
            leading_text_color: Color::BrightRed,
            message_color: Color::White,
            allowed_response_color: Color::BrightWhite,
        }
    }
}

impl Default for PromptStyle {
    fn default() -> Self {
        Self::normal()
    }
}

#[derive(Debug, Clone)]
pub struct InputPrompt {
    pub enable_color: bool,
    pub style: PromptStyle,
}

impl Default for InputPrompt {
    fn default() -> Self {
        Self {
            enable_color: true,
            style: PromptStyle::normal(),
        }
    }
}

impl InputPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks `prompt` until the user gives an allowed answer.
    ///
    /// `allowed` lists `(short, long)` pairs such as `("y", "yes")`; either form is accepted and
    /// the short one is returned. An empty list accepts any answer, which is returned as typed.
    /// Returns `None` when input is closed.
    pub fn input(
        &self,
        prompt: &str,
        allowed: &[(&str, &str)],
        style: Option<&PromptStyle>,
    ) -> Result<Option<String>, dialoguer::Error> {
        let style = style.unwrap_or(&self.style);
        let prompt_text = self.prompt_text(prompt, allowed, style);

        let response = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt_text)
            .allow_empty(allowed.is_empty())
            .validate_with(|response: &String| -> Result<(), String> {
                match resolve_response(allowed, response) {
                    Some(_) => Ok(()),
                    None => Err(format!("Expected one of {}", allowed_text(allowed))),
                }
            })
            .interact_text();

        match response {
            Ok(response) => Ok(resolve_response(allowed, &response)),
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::debug!("Input closed while prompting: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn prompt_text(&self, prompt: &str, allowed: &[(&str, &str)], style: &PromptStyle) -> String {
        let choices = if allowed.is_empty() {
            String::new()
        } else {
            allowed_text(allowed)
        };

        if !self.enable_color {
            return format!("{} {} {}", style.leading_text, prompt, choices)
                .trim_end()
                .to_string();
        }
        format!(
            "{} {} {}",
            style.leading_text.color(style.leading_text_color),
            prompt.color(style.message_color),
            choices.color(style.allowed_response_color)
        )
        .trim_end()
        .to_string()
    }
}

fn allowed_text(allowed: &[(&str, &str)]) -> String {
    let pairs: Vec<String> = allowed
        .iter()
        .map(|(short, long)| format!("{}/{}", short, long))
        .collect();
    format!("({})", pairs.join(", "))
}

/// Maps a typed answer to its short form. With no allowed answers, anything goes.
fn resolve_response(allowed: &[(&str, &str)], response: &str) -> Option<String> {
    if allowed.is_empty() {
        return Some(response.to_string());
    }
    allowed
        .iter()
        .find(|(short, long)| response == *short || response == *long)
        .map(|(short, _)| short.to_string())
}
