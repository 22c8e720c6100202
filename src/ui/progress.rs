//! Download progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::theme::UpdraftTheme;
use super::TransferHandle;

/// Percentage bar for a download; falls back to a spinner with a status
/// line while the total size is unknown.
pub struct TransferBar {
    bar: ProgressBar,
    theme: UpdraftTheme,
    spinning: bool,
}

impl TransferBar {
    /// Create a visible bar.
    pub fn new(message: &str, theme: UpdraftTheme) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(Self::percent_style());
        bar.set_message(message.to_string());
        Self {
            bar,
            theme,
            spinning: false,
        }
    }

    /// Create a bar that doesn't show (for silent mode).
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            theme: UpdraftTheme::plain(),
            spinning: false,
        }
    }

    fn percent_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{msg} [{bar:30.cyan/dim}] {pos:>3}%")
            .unwrap()
            .progress_chars("█▓░")
    }

    fn status_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap()
    }

    fn finish_with(&self, line: String) {
        self.bar
            .set_style(ProgressStyle::default_bar().template("{msg}").unwrap());
        self.bar.finish_with_message(line);
    }
}

impl TransferHandle for TransferBar {
    fn set_percent(&mut self, percent: u8) {
        if self.spinning {
            self.bar.disable_steady_tick();
            self.bar.set_style(Self::percent_style());
            self.spinning = false;
        }
        self.bar.set_position(u64::from(percent.min(100)));
    }

    fn set_status(&mut self, status: &str) {
        if !self.spinning {
            self.bar.set_style(Self::status_style());
            self.bar.enable_steady_tick(Duration::from_millis(100));
            self.spinning = true;
        }
        self.bar.set_message(status.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        self.finish_with(self.theme.format_success(msg));
    }

    fn finish_error(&mut self, msg: &str) {
        self.finish_with(self.theme.format_error(msg));
    }
}
