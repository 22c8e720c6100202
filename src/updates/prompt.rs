//! Interactive update flow: check, confirm, download, hand off.

use super::fetch::{format_bytes, CancelToken};
use super::install::InstallMethod;
use super::release::{AvailableRelease, CheckError, ReleaseCheck};
use super::session::{DownloadOutcome, Handoff, UpdateSession};
use crate::error::{Result, UpdraftError};
use crate::ui::{Prompt, PromptResult, TransferSink, UserInterface};

/// Prompt key for the install confirmation.
pub const CONFIRM_KEY: &str = "apply_update";

/// Options for [`run_update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Repository to check instead of the configured one.
    pub repository: Option<String>,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    /// Name used in package manager hints.
    pub package_name: String,
}

/// How an update attempt ended.
#[derive(Debug)]
pub enum UpdateFlow {
    /// The running build is the latest.
    UpToDate,
    /// The release check failed.
    CheckFailed(CheckError),
    /// A package manager owns the executable.
    ManagedInstall(InstallMethod),
    /// The user did not confirm.
    Declined,
    /// The download failed.
    DownloadFailed(UpdraftError),
    /// The user cancelled the download.
    Cancelled,
    /// The helper is running; the caller should exit now.
    HandedOff(Handoff),
}

impl UpdateFlow {
    /// Whether the attempt ended without an error.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::UpToDate | Self::ManagedInstall(_) | Self::Declined | Self::HandedOff(_)
        )
    }
}

/// Run a complete update against `session`.
///
/// Returns `Err` only for programmer errors and failures to launch the
/// helper; check and download problems are reported as [`UpdateFlow`]
/// variants after being shown to the user.
pub fn run_update(
    session: &mut UpdateSession,
    method: &InstallMethod,
    ui: &mut dyn UserInterface,
    options: &UpdateOptions,
    cancel: &CancelToken,
) -> Result<UpdateFlow> {
    let mut spinner = ui.start_spinner("Checking for updates...");
    let check = match &options.repository {
        Some(repo) => session.check_for_update(repo),
        None => session.check_configured(),
    };

    let release = match check {
        ReleaseCheck::Failed(e) => {
            spinner.finish_error(&format!("Update check failed: {}", e));
            return Ok(UpdateFlow::CheckFailed(e));
        }
        ReleaseCheck::UpToDate { current, .. } => {
            spinner.finish_success(&format!("Already up to date ({})", current));
            return Ok(UpdateFlow::UpToDate);
        }
        ReleaseCheck::Available(release) => {
            spinner.finish_success(&format!(
                "New version available: {} -> {}",
                release.current, release.latest
            ));
            release
        }
    };

    show_release_notes(ui, &release);

    if !method.supports_self_replace() {
        ui.warning(&format!(
            "This copy was installed with {}; it will not be replaced in place.",
            method.name()
        ));
        if let Some(command) = method.update_command(&options.package_name) {
            ui.message(&format!("Run `{}` to upgrade.", command));
        }
        return Ok(UpdateFlow::ManagedInstall(method.clone()));
    }

    if !options.assume_yes && !confirm_install(ui, &release)? {
        ui.message("Update skipped.");
        return Ok(UpdateFlow::Declined);
    }

    let mut transfer = ui.start_transfer(&format!("Downloading {}", release.asset_name));
    let outcome = session.download_release(&release, &mut TransferSink(transfer.as_mut()), cancel)?;

    match outcome {
        DownloadOutcome::Completed { bytes, .. } => {
            transfer.finish_success(&format!(
                "Downloaded {} ({})",
                release.asset_name,
                format_bytes(bytes)
            ));
        }
        DownloadOutcome::Cancelled => {
            transfer.finish_error("Download cancelled");
            return Ok(UpdateFlow::Cancelled);
        }
        DownloadOutcome::Failed(e) => {
            transfer.finish_error(&format!("Download failed: {}", e));
            return Ok(UpdateFlow::DownloadFailed(e));
        }
    }
    drop(transfer);

    let handoff = session.launch_replacement()?;
    ui.success(&format!(
        "Installing {}; the application will restart in a moment.",
        release.latest
    ));
    ui.message(&format!("Helper log: {}", handoff.transcript.display()));
    Ok(UpdateFlow::HandedOff(handoff))
}

fn show_release_notes(ui: &mut dyn UserInterface, release: &AvailableRelease) {
    if !ui.output_mode().shows_details() {
        return;
    }
    if let Some(notes) = release.release_notes.as_deref().map(str::trim) {
        if !notes.is_empty() {
            ui.message(&format!("\nRelease notes for {}:\n{}\n", release.tag, notes));
        }
    }
}

fn confirm_install(ui: &mut dyn UserInterface, release: &AvailableRelease) -> Result<bool> {
    if !ui.is_interactive() {
        ui.message("Re-run with --yes to install without confirmation.");
        return Ok(false);
    }

    let prompt = Prompt::confirm(
        CONFIRM_KEY,
        &format!("Install {} now?", release.latest),
        true,
    );
    match ui.prompt(&prompt)? {
        PromptResult::Bool(confirmed) => Ok(confirmed),
        PromptResult::String(_) => Ok(false),
    }
}
