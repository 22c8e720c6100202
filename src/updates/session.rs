//! The update session.
//!
//! [`UpdateSession`] is the single object surrounding code talks to. It
//! owns the staging folder and wires the release resolver, the secure
//! fetcher and the replacement helper into
//! check -> download -> stage -> hand off. The caller decides when each
//! step runs and renders the results.
//!
//! # Example
//!
//! ```no_run
//! use updraft::config::UpdaterConfig;
//! use updraft::updates::{CancelToken, NoProgress, UpdateSession, Version, VERSION};
//!
//! let config = UpdaterConfig::default();
//! let mut session = UpdateSession::new(&config, Version::parse(VERSION))?;
//!
//! let check = session.check_for_update("acme/player");
//! if let Some(url) = check.download_url().cloned() {
//!     let outcome = session.download(url.as_str(), &mut NoProgress, &CancelToken::new())?;
//!     if outcome.is_success() {
//!         session.launch_replacement()?;
//!         std::process::exit(0);
//!     }
//! }
//! # Ok::<(), updraft::UpdraftError>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdraftError};

use super::fetch::{parse_checksum, require_https, CancelToken, ProgressSink, SecureFetcher};
use super::release::{AvailableRelease, CheckError, ReleaseCheck, ReleaseResolver};
use super::replace::{hand_off, HelperLauncher, ReplacementPlan, ScriptFlavor, SystemLauncher};
use super::staging::StagingFolder;
use super::transport::{HttpTransport, Transport};
use super::version::Version;

/// Result of a download attempt that got past argument validation.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The artifact is staged.
    Completed {
        /// Where the artifact was staged.
        path: PathBuf,
        /// Size in bytes.
        bytes: u64,
        /// Lowercase hex SHA-256.
        sha256: String,
    },
    /// The download failed; nothing is staged.
    Failed(UpdraftError),
    /// The caller cancelled; nothing is staged.
    Cancelled,
}

impl DownloadOutcome {
    /// Whether the artifact is staged.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// The failure cause, if any.
    pub fn error(&self) -> Option<&UpdraftError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// What was handed to the replacement helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Executable that will be replaced and relaunched.
    pub target: PathBuf,
    /// Generated helper script.
    pub script: PathBuf,
    /// Where the helper writes its output.
    pub transcript: PathBuf,
}

/// Composes check, download and replacement around one staging folder.
pub struct UpdateSession {
    current: Version,
    repository: Option<String>,
    relaunch_args: Vec<String>,
    staging: StagingFolder,
    transport: Arc<dyn Transport>,
    resolver: ReleaseResolver,
    fetcher: SecureFetcher,
    launcher: Box<dyn HelperLauncher>,
    target: Option<PathBuf>,
}

impl UpdateSession {
    /// Create a session talking to the network over HTTPS.
    pub fn new(config: &UpdaterConfig, current: Version) -> Result<Self> {
        let transport = HttpTransport::new(&config.user_agent(), config.check_timeout())?;
        Self::with_transport(config, current, Arc::new(transport))
    }

    /// Create a session over an explicit transport.
    pub fn with_transport(
        config: &UpdaterConfig,
        current: Version,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let resolver =
            ReleaseResolver::new(transport.clone(), &config.api_base, &config.asset_suffix())?;
        let fetcher = SecureFetcher::new(transport.clone());
        let staging = StagingFolder::new(config.staging_root(), config.executable_name());

        Ok(Self {
            current,
            repository: config.repository.clone(),
            relaunch_args: config.relaunch_args.clone(),
            staging,
            transport,
            resolver,
            fetcher,
            launcher: Box::new(SystemLauncher),
            target: None,
        })
    }

    /// Replace the helper launcher.
    pub fn with_launcher(mut self, launcher: Box<dyn HelperLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replace a specific executable instead of the running one.
    pub fn with_target_executable(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Version of the running build.
    pub fn current_version(&self) -> &Version {
        &self.current
    }

    /// The staging folder this session owns.
    pub fn staging(&self) -> &StagingFolder {
        &self.staging
    }

    /// Check `repo_ref` for a newer release. Never fails; problems are
    /// reported as [`ReleaseCheck::Failed`].
    pub fn check_for_update(&self, repo_ref: &str) -> ReleaseCheck {
        self.resolver.check(repo_ref, &self.current)
    }

    /// Check the configured repository.
    pub fn check_configured(&self) -> ReleaseCheck {
        match &self.repository {
            Some(repo) => self.check_for_update(repo),
            None => ReleaseCheck::Failed(CheckError::InvalidReference {
                reference: String::new(),
            }),
        }
    }

    /// Download `url` into the staging folder.
    ///
    /// Returns `Err` only for [`UpdraftError::InvalidArgument`] (malformed or
    /// non-HTTPS URL), before any network or disk activity. Every other
    /// failure is reported in the outcome. Any previously staged artifact is
    /// discarded first.
    pub fn download(
        &mut self,
        url: &str,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<DownloadOutcome> {
        let url = require_https(url)?;

        if let Err(e) = self.staging.reset() {
            tracing::warn!(
                "Could not prepare staging folder {}: {}",
                self.staging.root().display(),
                e
            );
            return Ok(DownloadOutcome::Failed(e));
        }

        let destination = self.staging.artifact_path();
        tracing::info!("Downloading {} to {}", url, destination.display());

        match self.fetcher.fetch(&url, &destination, sink, cancel) {
            Ok(report) => {
                tracing::info!("Staged {} bytes (sha256 {})", report.bytes, report.sha256);
                Ok(DownloadOutcome::Completed {
                    path: destination,
                    bytes: report.bytes,
                    sha256: report.sha256,
                })
            }
            Err(UpdraftError::Cancelled) => {
                tracing::info!("Download cancelled");
                Ok(DownloadOutcome::Cancelled)
            }
            Err(e) if e.is_argument_error() => Err(e),
            Err(e) => {
                tracing::warn!("Download failed: {}", e);
                Ok(DownloadOutcome::Failed(e))
            }
        }
    }

    /// Download `url` and, when `expected_sha256` is given, verify the digest.
    ///
    /// A mismatch removes the staged artifact and fails with
    /// [`UpdraftError::ChecksumMismatch`].
    pub fn download_verified(
        &mut self,
        url: &str,
        expected_sha256: Option<&str>,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<DownloadOutcome> {
        let outcome = self.download(url, sink, cancel)?;

        let (DownloadOutcome::Completed { sha256, .. }, Some(expected)) =
            (&outcome, expected_sha256)
        else {
            return Ok(outcome);
        };

        let expected = expected.trim().to_ascii_lowercase();
        if *sha256 == expected {
            tracing::debug!("Checksum verified");
            return Ok(outcome);
        }

        let actual = sha256.clone();
        if let Err(e) = std::fs::remove_file(self.staging.artifact_path()) {
            tracing::warn!("Could not remove unverified artifact: {}", e);
        }
        Ok(DownloadOutcome::Failed(UpdraftError::ChecksumMismatch {
            expected,
            actual,
        }))
    }

    /// Download the asset of `release`, verifying it against the published
    /// checksum when one exists.
    pub fn download_release(
        &mut self,
        release: &AvailableRelease,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<DownloadOutcome> {
        let expected = self.fetch_checksum(release);
        self.download_verified(
            release.download_url.as_str(),
            expected.as_deref(),
            sink,
            cancel,
        )
    }

    /// Fetch the published SHA-256 for `release`, if it has one.
    ///
    /// Failures are logged and treated as "no checksum".
    pub fn fetch_checksum(&self, release: &AvailableRelease) -> Option<String> {
        let url = release.checksum_url.as_ref()?;
        match self.transport.get_text(url, &[]) {
            Ok(response) if (200..300).contains(&response.status) => {
                let digest = parse_checksum(&response.body);
                if digest.is_none() {
                    tracing::warn!("No SHA-256 digest found in {}", url);
                }
                digest
            }
            Ok(response) => {
                tracing::warn!("HTTP {} fetching checksum {}", response.status, url);
                None
            }
            Err(e) => {
                tracing::warn!("Could not fetch checksum {}: {}", url, e);
                None
            }
        }
    }

    /// Path of the staged artifact, if one is staged.
    pub fn staged_artifact_path(&self) -> Option<PathBuf> {
        self.staging
            .has_artifact()
            .then(|| self.staging.artifact_path())
    }

    /// Hand the staged artifact to the replacement helper.
    ///
    /// Fails with [`UpdraftError::ArtifactMissing`] without launching
    /// anything when no artifact is staged. On success the caller should
    /// exit promptly.
    pub fn launch_replacement(&mut self) -> Result<Handoff> {
        if !self.staging.has_artifact() {
            return Err(UpdraftError::ArtifactMissing {
                path: self.staging.artifact_path(),
            });
        }

        let target = match &self.target {
            Some(target) => target.clone(),
            None => std::env::current_exe().map_err(|e| UpdraftError::ExecutableUnknown {
                message: e.to_string(),
            })?,
        };

        let plan = ReplacementPlan::new(&target, &self.staging)
            .with_relaunch_args(self.relaunch_args.clone());
        let transcript = self.staging.transcript_path();

        hand_off(&plan, ScriptFlavor::native(), self.launcher.as_ref(), &transcript)?;

        Ok(Handoff {
            target,
            script: plan.script,
            transcript,
        })
    }

    /// Remove the staging folder. Safe to call any number of times.
    pub fn cleanup(&mut self) {
        match self.staging.remove() {
            Ok(()) => tracing::debug!("Removed {}", self.staging.root().display()),
            Err(e) => tracing::warn!(
                "Could not remove staging folder {}: {}",
                self.staging.root().display(),
                e
            ),
        }
    }
}
