// UI layer: interactive prompts and progress feedback using `dialoguer`
// and `indicatif`. Prompting goes through the `Prompter` trait so flows
// can run under tests without a terminal.

use std::time::Duration;

use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::TstError;

/// Interactive questions a flow may ask.
pub trait Prompter {
    /// Yes/no question; `default` is the answer a bare Enter gives.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, TstError>;

    /// One free-form line of input, trimmed.
    fn input(&mut self, prompt: &str) -> Result<String, TstError>;
}

/// Terminal-backed prompter used by the binary.
pub struct TermPrompter;

impl Prompter for TermPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, TstError> {
        Ok(Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn input(&mut self, prompt: &str) -> Result<String, TstError> {
        let line: String = Input::new().with_prompt(prompt).interact_text()?;
        Ok(line.trim().to_string())
    }
}

/// Spinner shown while a request is in flight. Callers clear it before
/// printing anything else.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
