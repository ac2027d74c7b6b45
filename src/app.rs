//! Application context: state shared by the command handler.

use anyhow::{Context, Result};

use crate::output::OutputContext;

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
}

pub struct AppContext {
    /// Terminal output context.
    pub output: OutputContext,
}

impl AppContext {
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        Self {
            output: OutputContext::new(flags.no_color),
        }
    }

    /// Ask the operator for a line of text.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn prompt_text(&self, prompt: &str) -> Result<String> {
        let answer: String = dialoguer::Input::new()
            .with_prompt(prompt)
            .interact_text()
            .context("failed to read from terminal")?;
        Ok(answer.trim().to_string())
    }
}
