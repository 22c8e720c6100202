//! Error types for updraft operations.
//!
//! This module defines [`UpdraftError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Release checks never return `Err`; their failures are carried inside
//!   [`ReleaseCheck::Failed`](crate::updates::ReleaseCheck) as a [`CheckError`](crate::updates::CheckError)
//! - Downloads only return `Err` for caller mistakes ([`UpdraftError::InvalidArgument`]);
//!   everything transient is reported through a
//!   [`DownloadOutcome`](crate::updates::DownloadOutcome)
//! - Use `anyhow::Error` (via `UpdraftError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for updraft operations.
#[derive(Debug, Error)]
pub enum UpdraftError {
    /// Configuration file not found at an explicitly requested location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// The caller passed something that can never work (bad URL, non-HTTPS scheme).
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The artifact is larger than the download policy allows.
    #[error("Artifact exceeds the {limit} byte limit ({observed} bytes)")]
    SizeExceeded { limit: u64, observed: u64 },

    /// The connection failed, timed out, or the server answered with an error status.
    #[error("Transfer failed: {message}")]
    Transport { message: String },

    /// The transfer ended without producing the expected file.
    #[error("Incomplete download: {message}")]
    IncompleteWrite { message: String },

    /// The downloaded bytes do not match the published digest.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The caller cancelled the operation.
    #[error("Download cancelled")]
    Cancelled,

    /// No staged artifact exists to install.
    #[error("No downloaded update found at {path}")]
    ArtifactMissing { path: PathBuf },

    /// The staging folder location is unsafe or holds files updraft did not create.
    #[error("Refusing to use {path} as the staging folder: {reason}")]
    UnsafeStagingFolder { path: PathBuf, reason: String },

    /// The running executable could not be located.
    #[error("Cannot determine the running executable: {message}")]
    ExecutableUnknown { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UpdraftError {
    /// Create an [`UpdraftError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an [`UpdraftError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an [`UpdraftError::IncompleteWrite`].
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::IncompleteWrite {
            message: message.into(),
        }
    }

    /// Whether this error is a caller mistake rather than a runtime condition.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Result type alias for updraft operations.
pub type Result<T> = std::result::Result<T, UpdraftError>;
