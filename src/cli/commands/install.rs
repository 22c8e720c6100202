//! Install command implementation.
//!
//! The `updraft install` command hands a previously downloaded artifact to
//! the replacement helper and exits so the helper can swap the executable.

use crate::cli::args::InstallArgs;
use crate::cli::context::CommandContext;
use crate::error::Result;
use crate::ui::{Prompt, PromptResult, UserInterface};
use crate::updates::prompt::CONFIRM_KEY;
use crate::updates::{detect_install_method, InstallMethod};

use super::dispatcher::{Command, CommandResult};

/// The install command implementation.
pub struct InstallCommand {
    context: CommandContext,
    args: InstallArgs,
    method: Option<InstallMethod>,
}

impl InstallCommand {
    /// Create a new install command.
    pub fn new(context: CommandContext, args: InstallArgs) -> Self {
        Self {
            context,
            args,
            method: None,
        }
    }

    /// Use `method` instead of detecting how this copy was installed.
    pub fn with_install_method(mut self, method: InstallMethod) -> Self {
        self.method = Some(method);
        self
    }

    fn confirmed(&self, ui: &mut dyn UserInterface) -> Result<bool> {
        if self.args.yes {
            return Ok(true);
        }
        if !ui.is_interactive() {
            ui.message("Re-run with --yes to install without confirmation.");
            return Ok(false);
        }
        let prompt = Prompt::confirm(CONFIRM_KEY, "Replace the running executable now?", true);
        Ok(matches!(ui.prompt(&prompt)?, PromptResult::Bool(true)))
    }
}

impl Command for InstallCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut session = self.context.open_session()?;

        let Some(artifact) = session.staged_artifact_path() else {
            ui.error("Nothing is staged. Run 'updraft download <url>' first.");
            return Ok(CommandResult::failure(1));
        };

        let method = self.method.clone().unwrap_or_else(detect_install_method);
        if !method.supports_self_replace() {
            ui.warning(&format!(
                "This copy was installed with {}; it will not be replaced in place.",
                method.name()
            ));
            if let Some(command) = method.update_command(env!("CARGO_PKG_NAME")) {
                ui.message(&format!("Run `{}` to upgrade.", command));
            }
            return Ok(CommandResult::failure(1));
        }

        ui.message(&format!("Staged artifact: {}", artifact.display()));
        if !self.confirmed(ui)? {
            ui.message("Install skipped.");
            return Ok(CommandResult::failure(1));
        }

        let handoff = session.launch_replacement()?;
        ui.success(&format!(
            "Replacing {}; it will restart in a moment.",
            handoff.target.display()
        ));
        ui.message(&format!("Helper log: {}", handoff.transcript.display()));
        Ok(CommandResult::success())
    }
}
