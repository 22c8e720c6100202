//! Non-interactive UI for scripts and CI.

use std::collections::HashMap;

use crate::error::{Result, UpdraftError};
use crate::updates::fetch::format_bytes;

use super::{
    parse_yes, OutputMode, Prompt, PromptResult, PromptType, SpinnerHandle, TransferHandle,
    UserInterface,
};

const PROMPT_ENV_PREFIX: &str = "UPDRAFT_PROMPT_";

/// UI implementation for non-interactive mode.
///
/// Prompts are answered from `UPDRAFT_PROMPT_<KEY>` environment variables
/// or the prompt's default. Progress is printed as occasional plain lines
/// instead of redrawn bars.
pub struct NonInteractiveUI {
    mode: OutputMode,
    env_overrides: HashMap<String, String>,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        let env_overrides = std::env::vars()
            .filter(|(k, _)| k.starts_with(PROMPT_ENV_PREFIX))
            .collect();

        Self {
            mode,
            env_overrides,
        }
    }

    /// Create with explicit overrides (for testing).
    pub fn with_overrides(mode: OutputMode, overrides: HashMap<String, String>) -> Self {
        Self {
            mode,
            env_overrides: overrides,
        }
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("⚠ {}", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        let env_key = format!("{}{}", PROMPT_ENV_PREFIX, prompt.key.to_uppercase());
        let answer = self
            .env_overrides
            .get(&env_key)
            .or(prompt.default.as_ref())
            .cloned()
            .ok_or_else(|| UpdraftError::ConfigValidationError {
                message: format!(
                    "Cannot prompt for '{}' in non-interactive mode (no default value)",
                    prompt.key
                ),
            })?;

        Ok(match prompt.prompt_type {
            PromptType::Confirm => PromptResult::Bool(parse_yes(&answer)),
            PromptType::Input => PromptResult::String(answer),
        })
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_status() {
            println!("{}", message);
        }
        Box::new(PlainLines { mode: self.mode })
    }

    fn start_transfer(&mut self, message: &str) -> Box<dyn TransferHandle> {
        if self.mode.shows_status() {
            println!("{}", message);
        }
        Box::new(PlainTransfer {
            mode: self.mode,
            last_decile: None,
        })
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", title);
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

struct PlainLines {
    mode: OutputMode,
}

impl SpinnerHandle for PlainLines {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }
}

/// Prints download progress once per 10%.
struct PlainTransfer {
    mode: OutputMode,
    last_decile: Option<u8>,
}

impl TransferHandle for PlainTransfer {
    fn set_percent(&mut self, percent: u8) {
        let decile = percent / 10;
        if self.last_decile.is_some_and(|d| d >= decile) {
            return;
        }
        self.last_decile = Some(decile);
        if self.mode.shows_details() {
            println!("  {}%", decile * 10);
        }
    }

    fn set_status(&mut self, status: &str) {
        tracing::debug!("download: {}", status);
    }

    fn finish_success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }
}

/// One-line summary of a download size for plain output.
pub fn describe_size(bytes: u64) -> String {
    format!("{} ({} bytes)", format_bytes(bytes), bytes)
}
