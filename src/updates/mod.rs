//! Self-update core.
//!
//! Leaves first:
//! - [`version`]: parse and compare release versions
//! - [`release`]: resolve the latest release and its platform asset
//! - [`transport`] / [`fetch`]: bounded HTTPS downloads with progress and cancellation
//! - [`staging`] / [`replace`]: the staging folder and the detached replacement helper
//! - [`session`]: the facade composing all of the above
//! - [`install`] / [`prompt`]: install-method detection and the interactive flow

pub mod fetch;
pub mod install;
pub mod mock;
pub mod prompt;
pub mod release;
pub mod replace;
pub mod session;
pub mod staging;
pub mod transport;
pub mod version;

pub use fetch::{
    format_bytes, require_https, CancelToken, FetchReport, NoProgress, Progress, ProgressSink,
    SecureFetcher, MAX_ARTIFACT_BYTES,
};
pub use install::{detect_install_method, detect_install_method_for, InstallMethod};
pub use prompt::{run_update, UpdateFlow, UpdateOptions};
pub use release::{
    AvailableRelease, CheckError, ReleaseCheck, ReleaseResolver, RepositoryRef, DEFAULT_API_BASE,
};
pub use replace::{
    HelperFailure, HelperLauncher, ReplacementPlan, ScriptFlavor, SystemLauncher,
    DELETE_ATTEMPTS, RETRY_BACKOFF, STARTUP_DELAY,
};
pub use session::{DownloadOutcome, Handoff, UpdateSession};
pub use staging::StagingFolder;
pub use transport::{HttpTransport, Transport};
pub use version::{is_newer_version, ComparisonBasis, UpdateDecision, Version, VERSION};
