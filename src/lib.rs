//! Updraft - self-updating for desktop executables.
//!
//! Updraft checks a GitHub-style release feed for a newer build of the
//! running program, downloads the platform asset over HTTPS into a staging
//! folder, and hands it to a detached helper that swaps the executable
//! once the program has exited and starts the new build.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`ui`] - Interactive prompts, spinners, and terminal output
//! - [`updates`] - Version model, release resolver, fetcher, and replacement helper
//!
//! # Example
//!
//! ```
//! use updraft::updates::{is_newer_version, Version};
//!
//! let decision = is_newer_version(&Version::parse("v1.4.0"), &Version::parse("1.3.9"));
//! assert!(decision.available);
//! assert_eq!(Version::parse("v2.0.1").triple(), Some((2, 0, 1)));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod ui;
pub mod updates;

pub use error::{Result, UpdraftError};
