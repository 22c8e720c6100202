//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion. It can be configured with
//! pre-determined prompt responses.
//!
//! # Example
//!
//! ```
//! use updraft::ui::{MockUI, Prompt, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.set_prompt_response("apply_update", "yes");
//!
//! let answer = ui.prompt(&Prompt::confirm("apply_update", "Install now?", false)).unwrap();
//! ui.success("Done!");
//!
//! assert_eq!(answer.as_bool(), Some(true));
//! assert!(ui.successes().contains(&"Done!".to_string()));
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, UpdraftError};

use super::{
    parse_yes, OutputMode, Prompt, PromptResult, PromptType, SpinnerHandle, TransferHandle,
    UserInterface,
};

type Log = Rc<RefCell<Vec<String>>>;

/// Mock UI implementation for testing.
///
/// Captures all UI interactions and allows pre-configured prompt responses.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    interactive: bool,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    spinners: Vec<String>,
    spinner_updates: Log,
    transfer_updates: Log,
    prompt_responses: HashMap<String, String>,
    prompts_shown: Vec<String>,
}

impl MockUI {
    /// Create a new non-interactive MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Set a response for a prompt key.
    pub fn set_prompt_response(&mut self, key: &str, response: &str) {
        self.prompt_responses
            .insert(key.to_string(), response.to_string());
    }

    /// Set whether this mock behaves as interactive.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Get all captured messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Get all captured success messages.
    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    /// Get all captured warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get all captured errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Get all captured headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Messages each spinner was started with.
    pub fn spinners(&self) -> &[String] {
        &self.spinners
    }

    /// Everything spinners were told after they started, in order.
    pub fn spinner_updates(&self) -> Vec<String> {
        self.spinner_updates.borrow().clone()
    }

    /// Everything transfer displays were told, in order (`"<n>%"` for percentages).
    pub fn transfer_updates(&self) -> Vec<String> {
        self.transfer_updates.borrow().clone()
    }

    /// Keys of prompts shown so far.
    pub fn prompts_shown(&self) -> &[String] {
        &self.prompts_shown
    }

    /// Check whether any message, success, warning or error contains `text`.
    pub fn has_message(&self, text: &str) -> bool {
        self.messages
            .iter()
            .chain(&self.successes)
            .chain(&self.warnings)
            .chain(&self.errors)
            .any(|m| m.contains(text))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        self.prompts_shown.push(prompt.key.clone());

        let answer = self
            .prompt_responses
            .get(&prompt.key)
            .or(prompt.default.as_ref())
            .cloned()
            .ok_or_else(|| UpdraftError::ConfigValidationError {
                message: format!("No mock response for prompt '{}'", prompt.key),
            })?;

        Ok(match prompt.prompt_type {
            PromptType::Confirm => PromptResult::Bool(parse_yes(&answer)),
            PromptType::Input => PromptResult::String(answer),
        })
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.spinners.push(message.to_string());
        Box::new(MockHandle {
            log: self.spinner_updates.clone(),
        })
    }

    fn start_transfer(&mut self, _message: &str) -> Box<dyn TransferHandle> {
        Box::new(MockHandle {
            log: self.transfer_updates.clone(),
        })
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Spinner and transfer handle that appends to a shared log.
struct MockHandle {
    log: Log,
}

impl SpinnerHandle for MockHandle {
    fn set_message(&mut self, msg: &str) {
        self.log.borrow_mut().push(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        self.log.borrow_mut().push(msg.to_string());
    }

    fn finish_error(&mut self, msg: &str) {
        self.log.borrow_mut().push(msg.to_string());
    }
}

impl TransferHandle for MockHandle {
    fn set_percent(&mut self, percent: u8) {
        self.log.borrow_mut().push(format!("{}%", percent));
    }

    fn set_status(&mut self, status: &str) {
        self.log.borrow_mut().push(status.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        self.log.borrow_mut().push(msg.to_string());
    }

    fn finish_error(&mut self, msg: &str) {
        self.log.borrow_mut().push(msg.to_string());
    }
}
