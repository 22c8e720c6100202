//! Configuration schema for updraft.
//!
//! Maps the YAML configuration file onto [`UpdaterConfig`]. Every field is
//! optional in the file; accessors supply the platform defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::updates::release::DEFAULT_API_BASE;
use crate::updates::staging::StagingFolder;
use crate::updates::transport::DEFAULT_REQUEST_TIMEOUT;
use crate::updates::version::VERSION;

/// Root configuration structure for `config.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Repository whose releases are followed (`owner/name` or a URL).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Base URL of the release metadata API.
    #[serde(default = "default_api_base", skip_serializing_if = "is_default_api_base")]
    pub api_base: String,

    /// Folder used to stage downloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,

    /// File name of the staged executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_name: Option<String>,

    /// Suffix identifying this platform's release asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_suffix: Option<String>,

    /// Timeout for the release check, in seconds.
    #[serde(
        default = "default_check_timeout_secs",
        skip_serializing_if = "is_default_check_timeout_secs"
    )]
    pub check_timeout_secs: u64,

    /// Client identity sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Arguments passed to the application when it is relaunched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relaunch_args: Vec<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            repository: None,
            api_base: default_api_base(),
            staging_dir: None,
            executable_name: None,
            asset_suffix: None,
            check_timeout_secs: default_check_timeout_secs(),
            user_agent: None,
            relaunch_args: Vec::new(),
        }
    }
}

impl UpdaterConfig {
    /// Staging folder root, defaulting to `<temp>/updraft-update`.
    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(StagingFolder::default_root)
    }

    /// Asset suffix, defaulting to the platform's.
    pub fn asset_suffix(&self) -> String {
        self.asset_suffix
            .clone()
            .unwrap_or_else(default_asset_suffix)
    }

    /// Release check timeout, never more than 30 seconds.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs).min(DEFAULT_REQUEST_TIMEOUT)
    }

    /// User agent, defaulting to `updraft/<version>`.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("updraft/{}", VERSION))
    }

    /// Staged executable name: configured, else the running executable's.
    pub fn executable_name(&self) -> String {
        self.executable_name
            .clone()
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            })
            .unwrap_or_else(|| format!("updraft{}", std::env::consts::EXE_SUFFIX))
    }
}

/// `.exe` on Windows, `-<os>-<arch>` elsewhere (e.g. `-linux-x86_64`).
pub fn default_asset_suffix() -> String {
    if cfg!(windows) {
        ".exe".to_string()
    } else {
        format!("-{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn is_default_api_base(v: &str) -> bool {
    v == DEFAULT_API_BASE
}

fn default_check_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn is_default_check_timeout_secs(v: &u64) -> bool {
    *v == default_check_timeout_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: UpdaterConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, UpdaterConfig::default());
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.check_timeout_secs, 30);
    }

    #[test]
    fn parses_all_fields() {
        let yaml = r#"
repository: acme/player
api_base: https://github.example.com/api/v3
staging_dir: /var/tmp/player-update
executable_name: player
asset_suffix: -linux-arm64
check_timeout_secs: 10
user_agent: player-updater
relaunch_args: ["--updated"]
"#;
        let config: UpdaterConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.repository.as_deref(), Some("acme/player"));
        assert_eq!(config.staging_root(), PathBuf::from("/var/tmp/player-update"));
        assert_eq!(config.executable_name(), "player");
        assert_eq!(config.asset_suffix(), "-linux-arm64");
        assert_eq!(config.check_timeout(), Duration::from_secs(10));
        assert_eq!(config.user_agent(), "player-updater");
        assert_eq!(config.relaunch_args, vec!["--updated"]);
    }

    #[test]
    fn check_timeout_is_capped() {
        let config = UpdaterConfig {
            check_timeout_secs: 300,
            ..Default::default()
        };
        assert_eq!(config.check_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn default_user_agent_names_version() {
        let agent = UpdaterConfig::default().user_agent();
        assert!(agent.starts_with("updraft/"));
        assert!(agent.ends_with(VERSION));
    }

    #[test]
    fn default_staging_root_is_temp_folder() {
        assert_eq!(
            UpdaterConfig::default().staging_root(),
            StagingFolder::default_root()
        );
    }

    #[test]
    fn default_asset_suffix_matches_platform() {
        let suffix = default_asset_suffix();
        if cfg!(windows) {
            assert_eq!(suffix, ".exe");
        } else {
            assert!(suffix.contains(std::env::consts::OS));
            assert!(suffix.ends_with(std::env::consts::ARCH));
        }
    }

    #[test]
    fn serializing_defaults_omits_them() {
        let yaml = serde_yaml::to_string(&UpdaterConfig::default()).unwrap();
        assert_eq!(yaml.trim(), "{}");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config: UpdaterConfig = serde_yaml::from_str("colour: blue\n").unwrap();
        assert_eq!(config, UpdaterConfig::default());
    }
}
