//! Staging folder commands.
//!
//! `updraft path` prints the staged artifact; `updraft cleanup` removes the
//! staging folder.

use crate::cli::context::CommandContext;
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The path command implementation.
pub struct PathCommand {
    context: CommandContext,
}

impl PathCommand {
    /// Create a new path command.
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }
}

impl Command for PathCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let session = self.context.open_session()?;
        match session.staged_artifact_path() {
            Some(path) => {
                println!("{}", path.display());
                Ok(CommandResult::success())
            }
            None => {
                ui.error(&format!(
                    "Nothing is staged in {}",
                    session.staging().root().display()
                ));
                Ok(CommandResult::failure(1))
            }
        }
    }
}

/// The cleanup command implementation.
pub struct CleanupCommand {
    context: CommandContext,
}

impl CleanupCommand {
    /// Create a new cleanup command.
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }
}

impl Command for CleanupCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut session = self.context.open_session()?;
        let root = session.staging().root().to_path_buf();
        session.cleanup();

        if root.exists() {
            ui.warning(&format!("Could not remove {}", root.display()));
            return Ok(CommandResult::failure(1));
        }
        ui.success(&format!("Removed {}", root.display()));
        Ok(CommandResult::success())
    }
}
