//! Download command implementation.
//!
//! The `updraft download` command stages an artifact from an HTTPS URL,
//! showing progress and honouring Ctrl-C.

use crate::cli::args::DownloadArgs;
use crate::cli::context::CommandContext;
use crate::error::Result;
use crate::ui::{describe_size, TransferSink, UserInterface};
use crate::updates::DownloadOutcome;

use super::dispatcher::{Command, CommandResult};

/// The download command implementation.
pub struct DownloadCommand {
    context: CommandContext,
    args: DownloadArgs,
}

impl DownloadCommand {
    /// Create a new download command.
    pub fn new(context: CommandContext, args: DownloadArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &DownloadArgs {
        &self.args
    }
}

impl Command for DownloadCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut session = self.context.open_session()?;

        let mut transfer = ui.start_transfer("Downloading");
        let outcome = session.download_verified(
            &self.args.url,
            self.args.sha256.as_deref(),
            &mut TransferSink(transfer.as_mut()),
            self.context.cancel(),
        )?;

        match outcome {
            DownloadOutcome::Completed { path, bytes, sha256 } => {
                transfer.finish_success(&format!("Downloaded {}", describe_size(bytes)));
                drop(transfer);
                ui.message(&format!("Staged at {}", path.display()));
                if ui.output_mode().shows_details() {
                    ui.message(&format!("SHA-256: {}", sha256));
                }
                Ok(CommandResult::success())
            }
            DownloadOutcome::Cancelled => {
                transfer.finish_error("Download cancelled");
                Ok(CommandResult::failure(130))
            }
            DownloadOutcome::Failed(e) => {
                transfer.finish_error(&format!("Download failed: {}", e));
                Ok(CommandResult::failure(1))
            }
        }
    }
}
