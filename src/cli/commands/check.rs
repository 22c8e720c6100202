//! Check command implementation.
//!
//! The `updraft check` command asks the release feed whether a newer
//! build exists and reports it, optionally as JSON.

use anyhow::Context;
use serde::Serialize;

use crate::cli::args::CheckArgs;
use crate::cli::context::CommandContext;
use crate::error::Result;
use crate::ui::UserInterface;
use crate::updates::{ComparisonBasis, ReleaseCheck};

use super::dispatcher::{Command, CommandResult};

/// The check command implementation.
pub struct CheckCommand {
    context: CommandContext,
    args: CheckArgs,
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(context: CommandContext, args: CheckArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &CheckArgs {
        &self.args
    }

    fn run_check(&self) -> Result<ReleaseCheck> {
        let session = self.context.open_session()?;
        Ok(match &self.args.repo {
            Some(repo) => session.check_for_update(repo),
            None => session.check_configured(),
        })
    }
}

/// Machine-readable form of a [`ReleaseCheck`].
#[derive(Debug, Serialize)]
pub struct CheckReport {
    /// `available`, `up_to_date` or `failed`.
    pub status: &'static str,
    /// Version of the running build.
    pub current: String,
    /// Newest published version; absent when the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    /// Release tag exactly as published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Name of the asset chosen for this platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// HTTPS link to that asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Checksum file published with the release, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_url: Option<String>,
    /// Release body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    /// `numeric` or `textual`, naming how the versions were compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<&'static str>,
    /// RFC 3339 time the feed was read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<String>,
    /// Why the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckReport {
    /// Build a report for `check`, run from a build at `current`.
    pub fn from_check(check: &ReleaseCheck, current: &str) -> Self {
        let mut report = Self {
            status: "failed",
            current: current.to_string(),
            latest: None,
            tag: None,
            asset: None,
            download_url: None,
            checksum_url: None,
            release_notes: None,
            comparison: None,
            checked_at: None,
            error: None,
        };

        match check {
            ReleaseCheck::Available(release) => {
                report.status = "available";
                report.current = release.current.to_string();
                report.latest = Some(release.latest.to_string());
                report.tag = Some(release.tag.clone());
                report.asset = Some(release.asset_name.clone());
                report.download_url = Some(release.download_url.to_string());
                report.checksum_url = release.checksum_url.as_ref().map(ToString::to_string);
                report.release_notes = release.release_notes.clone();
                report.comparison = Some(match release.basis {
                    ComparisonBasis::Numeric => "numeric",
                    ComparisonBasis::Textual => "textual",
                });
                report.checked_at = Some(release.checked_at.to_rfc3339());
            }
            ReleaseCheck::UpToDate {
                current,
                latest,
                checked_at,
            } => {
                report.status = "up_to_date";
                report.current = current.to_string();
                report.latest = Some(latest.to_string());
                report.checked_at = Some(checked_at.to_rfc3339());
            }
            ReleaseCheck::Failed(e) => {
                report.error = Some(e.to_string());
            }
        }

        report
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if self.args.json {
            let check = self.run_check()?;
            let current = self.context.current_version().to_string();
            let report = CheckReport::from_check(&check, &current);
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize check report")?;
            println!("{}", json);
            return Ok(CommandResult::from_success(check.error().is_none()));
        }

        let mut spinner = ui.start_spinner("Checking for updates...");
        let check = self.run_check()?;

        match &check {
            ReleaseCheck::Available(release) => {
                spinner.finish_success(&format!(
                    "New version available: {} -> {}",
                    release.current, release.latest
                ));
                ui.message(&format!("Asset: {}", release.asset_name));
                ui.message(&format!("Download: {}", release.download_url));
                if ui.output_mode().shows_details() {
                    if let Some(notes) = release.release_notes.as_deref().map(str::trim) {
                        if !notes.is_empty() {
                            ui.message(&format!("\nRelease notes:\n{}", notes));
                        }
                    }
                }
                if release.basis == ComparisonBasis::Textual {
                    ui.warning("Versions are not numeric; any difference counts as an update.");
                }
                ui.message("Run 'updraft update' to install it.");
                Ok(CommandResult::success())
            }
            ReleaseCheck::UpToDate { current, .. } => {
                spinner.finish_success(&format!("Already up to date ({})", current));
                Ok(CommandResult::success())
            }
            ReleaseCheck::Failed(e) => {
                spinner.finish_error(&format!("Update check failed: {}", e));
                Ok(CommandResult::failure(1))
            }
        }
    }
}
