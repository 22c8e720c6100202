//! Configuration loading, parsing, and validation for updraft.
//!
//! - Schema definitions in [`schema`]
//! - File discovery, loading and environment overrides in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use updraft::config::{load_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let path = temp.path().join("config.yml");
//! fs::write(&path, "repository: acme/player").unwrap();
//!
//! let config = load_config(Some(&path)).unwrap();
//! validate(&config).unwrap();
//! assert!(config.repository.is_some());
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{
    apply_env_overrides, default_config_path, load_config, load_config_file, load_config_with,
    parse_config, ENV_API_BASE, ENV_ASSET_SUFFIX, ENV_REPOSITORY, ENV_STAGING_DIR,
};
pub use schema::{default_asset_suffix, UpdaterConfig};
pub use validator::{validate, validate_config, ValidationError};
