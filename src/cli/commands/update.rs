//! Update command implementation.
//!
//! The `updraft update` command checks, downloads and installs in one go.

use crate::cli::args::UpdateArgs;
use crate::cli::context::CommandContext;
use crate::error::Result;
use crate::ui::UserInterface;
use crate::updates::{detect_install_method, run_update, InstallMethod, UpdateFlow, UpdateOptions};

use super::dispatcher::{Command, CommandResult};

/// The update command implementation.
pub struct UpdateCommand {
    context: CommandContext,
    args: UpdateArgs,
    method: Option<InstallMethod>,
}

impl UpdateCommand {
    /// Create a new update command.
    pub fn new(context: CommandContext, args: UpdateArgs) -> Self {
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

    fn options(&self) -> UpdateOptions {
        UpdateOptions {
            repository: self.args.repo.clone(),
            assume_yes: self.args.yes,
            package_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl Command for UpdateCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut session = self.context.open_session()?;
        let method = self.method.clone().unwrap_or_else(detect_install_method);

        let flow = run_update(
            &mut session,
            &method,
            ui,
            &self.options(),
            self.context.cancel(),
        )?;
        tracing::debug!("Update finished: {:?}", flow);

        Ok(match flow {
            UpdateFlow::Cancelled => CommandResult::failure(130),
            other => CommandResult::from_success(other.is_success()),
        })
    }
}
