//! Release metadata resolution.
//!
//! Queries a GitHub-compatible `releases/latest` endpoint and turns the
//! answer into a [`ReleaseCheck`]. Nothing here returns an error: every
//! failure becomes [`ReleaseCheck::Failed`] with a [`CheckError`] the caller
//! can show.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{Result, UpdraftError};

use super::transport::Transport;
use super::version::{is_newer_version, strip_tag_prefix, ComparisonBasis, Version};

/// Default release-hosting API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Accept header for the versioned JSON API.
const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Suffix of the published checksum file for an asset.
const CHECKSUM_SUFFIX: &str = ".sha256";

/// Why a release check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// The repository reference is not `owner/name`.
    #[error("invalid repository reference: '{reference}'")]
    InvalidReference { reference: String },

    /// The repository has no published release.
    #[error("no releases found for {repository}")]
    NotFound { repository: String },

    /// The request failed or returned an error status.
    #[error("network error: {message}")]
    Network { message: String },

    /// The metadata could not be understood.
    #[error("could not parse release metadata: {message}")]
    Parse { message: String },

    /// The release has no asset for this platform.
    #[error("release {tag} has no asset ending in '{suffix}'")]
    NoAssetFound { tag: String, suffix: String },
}

/// An `owner/name` pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Account or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepositoryRef {
    /// Parse `owner/name` or a repository URL such as
    /// `https://github.com/owner/name`.
    ///
    /// The path must contain exactly two non-empty segments; a trailing
    /// `.git` is ignored.
    pub fn parse(input: &str) -> std::result::Result<Self, CheckError> {
        let invalid = || CheckError::InvalidReference {
            reference: input.to_string(),
        };
        let input = input.trim();

        let path = if input.contains("://") {
            let url = Url::parse(input).map_err(|_| invalid())?;
            if url.host_str().is_none() {
                return Err(invalid());
            }
            url.path().to_string()
        } else {
            input.to_string()
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let &[owner, name] = segments.as_slice() else {
            return Err(invalid());
        };
        let name = name.strip_suffix(".git").unwrap_or(name);

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A newer release with a downloadable asset for this platform.
#[derive(Debug, Clone)]
pub struct AvailableRelease {
    /// Version of the running build.
    pub current: Version,
    /// Latest published version (tag without the `v`).
    pub latest: Version,
    /// Raw tag name.
    pub tag: String,
    /// Name of the selected asset.
    pub asset_name: String,
    /// Where to download the asset.
    pub download_url: Url,
    /// Published checksum file for the asset, if any.
    pub checksum_url: Option<Url>,
    /// Release body (changelog).
    pub release_notes: Option<String>,
    /// How the versions were compared.
    pub basis: ComparisonBasis,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

/// Outcome of a release check.
#[derive(Debug, Clone)]
pub enum ReleaseCheck {
    /// A newer release is available.
    Available(Box<AvailableRelease>),
    /// The latest release is not newer than the running build.
    UpToDate {
        /// Version of the running build.
        current: Version,
        /// Latest published version.
        latest: Version,
        /// When the check ran.
        checked_at: DateTime<Utc>,
    },
    /// The check could not be completed.
    Failed(CheckError),
}

impl ReleaseCheck {
    /// Whether an update can be downloaded.
    pub fn update_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Latest published version, when the feed was read.
    pub fn latest_version(&self) -> Option<&Version> {
        match self {
            Self::Available(release) => Some(&release.latest),
            Self::UpToDate { latest, .. } => Some(latest),
            Self::Failed(_) => None,
        }
    }

    /// Asset URL, when an update is available.
    pub fn download_url(&self) -> Option<&Url> {
        match self {
            Self::Available(release) => Some(&release.download_url),
            _ => None,
        }
    }

    /// Changelog text, when an update is available.
    pub fn release_notes(&self) -> Option<&str> {
        match self {
            Self::Available(release) => release.release_notes.as_deref(),
            _ => None,
        }
    }

    /// Failure cause, when the check failed.
    pub fn error(&self) -> Option<&CheckError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Failure message, when the check failed.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<AssetDocument>,
}

#[derive(Debug, Deserialize)]
struct AssetDocument {
    name: String,
    browser_download_url: String,
}

/// Resolves the latest release of a repository.
pub struct ReleaseResolver {
    transport: Arc<dyn Transport>,
    api_base: Url,
    asset_suffix: String,
}

impl ReleaseResolver {
    /// Create a resolver against `api_base`, selecting assets ending in `asset_suffix`.
    ///
    /// `api_base` must be an HTTPS URL.
    pub fn new(transport: Arc<dyn Transport>, api_base: &str, asset_suffix: &str) -> Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| {
            UpdraftError::invalid_argument(format!("invalid API base '{}': {}", api_base, e))
        })?;
        if api_base.scheme() != "https" {
            return Err(UpdraftError::invalid_argument(format!(
                "API base '{}' must use https",
                api_base
            )));
        }
        if asset_suffix.is_empty() {
            return Err(UpdraftError::invalid_argument(
                "asset suffix must not be empty",
            ));
        }

        Ok(Self {
            transport,
            api_base,
            asset_suffix: asset_suffix.to_string(),
        })
    }

    /// The asset name suffix this resolver selects.
    pub fn asset_suffix(&self) -> &str {
        &self.asset_suffix
    }

    /// The `releases/latest` endpoint for `repo`.
    pub fn latest_release_url(&self, repo: &RepositoryRef) -> Url {
        let mut url = self.api_base.clone();
        // https URLs always have a hierarchical path.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "repos",
                repo.owner.as_str(),
                repo.name.as_str(),
                "releases",
                "latest",
            ]);
        }
        url
    }

    /// Check `repo_ref` for a release newer than `current`.
    pub fn check(&self, repo_ref: &str, current: &Version) -> ReleaseCheck {
        match self.resolve(repo_ref, current) {
            Ok(check) => check,
            Err(err) => {
                tracing::warn!("Update check for '{}' failed: {}", repo_ref, err);
                ReleaseCheck::Failed(err)
            }
        }
    }

    fn resolve(
        &self,
        repo_ref: &str,
        current: &Version,
    ) -> std::result::Result<ReleaseCheck, CheckError> {
        let repo = RepositoryRef::parse(repo_ref)?;
        let url = self.latest_release_url(&repo);

        let response = self
            .transport
            .get_text(
                &url,
                &[("Accept", ACCEPT_JSON), ("X-GitHub-Api-Version", API_VERSION)],
            )
            .map_err(|e| CheckError::Network {
                message: e.to_string(),
            })?;

        match response.status {
            404 => {
                return Err(CheckError::NotFound {
                    repository: repo.to_string(),
                })
            }
            status if !(200..300).contains(&status) => {
                return Err(CheckError::Network {
                    message: format!("HTTP {} from {}", status, url),
                })
            }
            _ => {}
        }

        let release: ReleaseDocument =
            serde_json::from_str(&response.body).map_err(|e| CheckError::Parse {
                message: e.to_string(),
            })?;

        let latest_text = strip_tag_prefix(&release.tag_name);
        if latest_text.is_empty() {
            return Err(CheckError::Parse {
                message: "release has an empty tag_name".to_string(),
            });
        }
        let latest = Version::parse(latest_text);

        let asset = release
            .assets
            .iter()
            .find(|a| a.name.ends_with(&self.asset_suffix))
            .ok_or_else(|| CheckError::NoAssetFound {
                tag: release.tag_name.clone(),
                suffix: self.asset_suffix.clone(),
            })?;

        let download_url = Url::parse(&asset.browser_download_url).map_err(|e| CheckError::Parse {
            message: format!("asset '{}' has an invalid download URL: {}", asset.name, e),
        })?;

        let checksum_name = format!("{}{}", asset.name, CHECKSUM_SUFFIX);
        let checksum_url = release
            .assets
            .iter()
            .find(|a| a.name == checksum_name)
            .and_then(|a| Url::parse(&a.browser_download_url).ok());

        let decision = is_newer_version(&latest, current);
        if decision.basis == ComparisonBasis::Textual {
            tracing::warn!(
                "Could not compare '{}' with '{}' numerically; treating any difference as an update",
                latest,
                current
            );
        }

        let checked_at = Utc::now();
        if !decision.available {
            tracing::info!("{} is up to date (latest {})", current, latest);
            return Ok(ReleaseCheck::UpToDate {
                current: current.clone(),
                latest,
                checked_at,
            });
        }

        tracing::info!("Update available: {} -> {} ({})", current, latest, asset.name);
        Ok(ReleaseCheck::Available(Box::new(AvailableRelease {
            current: current.clone(),
            latest,
            tag: release.tag_name.clone(),
            asset_name: asset.name.clone(),
            download_url,
            checksum_url,
            release_notes: release.body.filter(|b| !b.trim().is_empty()),
            basis: decision.basis,
            checked_at,
        })))
    }
}
