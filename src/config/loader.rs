//! Configuration file discovery and loading.
//!
//! Priority, highest first:
//! 1. `UPDRAFT_*` environment variables
//! 2. The file named by `--config` (must exist)
//! 3. `<config dir>/updraft/config.yml` (if present)
//! 4. Built-in defaults

use crate::config::schema::UpdaterConfig;
use crate::config::validator::validate;
use crate::error::{Result, UpdraftError};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `repository`.
pub const ENV_REPOSITORY: &str = "UPDRAFT_REPOSITORY";
/// Environment variable overriding `api_base`.
pub const ENV_API_BASE: &str = "UPDRAFT_API_BASE";
/// Environment variable overriding `staging_dir`.
pub const ENV_STAGING_DIR: &str = "UPDRAFT_STAGING_DIR";
/// Environment variable overriding `asset_suffix`.
pub const ENV_ASSET_SUFFIX: &str = "UPDRAFT_ASSET_SUFFIX";

/// The user's config file location: `<config dir>/updraft/config.yml`.
pub fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("updraft").join("config.yml"))
}

/// Load a single config file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<UpdaterConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            UpdraftError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            UpdraftError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into an [`UpdaterConfig`].
///
/// An empty document yields the defaults.
pub fn parse_config(content: &str, source_path: &Path) -> Result<UpdaterConfig> {
    if content.trim().is_empty() {
        return Ok(UpdaterConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| UpdraftError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply `UPDRAFT_*` overrides read through `lookup`.
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut UpdaterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_REPOSITORY) {
        config.repository = Some(v);
    }
    if let Some(v) = get(ENV_API_BASE) {
        config.api_base = v;
    }
    if let Some(v) = get(ENV_STAGING_DIR) {
        config.staging_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = get(ENV_ASSET_SUFFIX) {
        config.asset_suffix = Some(v);
    }
}

/// Load configuration with optional path override, then apply the
/// environment and validate.
pub fn load_config(config_override: Option<&Path>) -> Result<UpdaterConfig> {
    load_config_with(config_override, default_config_path(), |key| {
        std::env::var(key).ok()
    })
}

/// [`load_config`] with explicit discovery inputs.
pub fn load_config_with<F>(
    config_override: Option<&Path>,
    user_config: Option<PathBuf>,
    lookup: F,
) -> Result<UpdaterConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match config_override {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_config_file(path)?
        }
        None => match user_config.filter(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                load_config_file(&path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                UpdaterConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config, lookup);
    validate(&config)?;
    Ok(config)
}
