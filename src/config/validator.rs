//! Configuration validation.

use crate::config::schema::UpdaterConfig;
use crate::error::{Result, UpdraftError};
use crate::updates::release::RepositoryRef;
use crate::updates::staging::StagingFolder;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending field.
    pub field: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Collect every problem with `config`.
pub fn validate_config(config: &UpdaterConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match reqwest::Url::parse(&config.api_base) {
        Ok(url) if url.scheme() == "https" => {}
        Ok(_) => errors.push(ValidationError::new(
            "api_base",
            format!("api_base '{}' must use https", config.api_base),
        )),
        Err(e) => errors.push(ValidationError::new(
            "api_base",
            format!("api_base '{}' is not a URL: {}", config.api_base, e),
        )),
    }

    if let Some(repository) = &config.repository {
        if let Err(e) = RepositoryRef::parse(repository) {
            errors.push(ValidationError::new("repository", e.to_string()));
        }
    }

    if config.asset_suffix.as_deref() == Some("") {
        errors.push(ValidationError::new(
            "asset_suffix",
            "asset_suffix must not be empty",
        ));
    }

    if let Some(name) = &config.executable_name {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            errors.push(ValidationError::new(
                "executable_name",
                format!("executable_name '{}' must be a plain file name", name),
            ));
        }
    }

    if let Some(dir) = &config.staging_dir {
        if let Err(e) = StagingFolder::check_root(dir) {
            errors.push(ValidationError::new("staging_dir", e.to_string()));
        }
    }

    if config.check_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "check_timeout_secs",
            "check_timeout_secs must be at least 1",
        ));
    }

    errors
}

/// Validate `config`, joining all problems into one error.
pub fn validate(config: &UpdaterConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(UpdraftError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
