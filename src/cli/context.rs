//! Shared state for command execution.

use std::rc::Rc;
use std::sync::Arc;

use crate::config::UpdaterConfig;
use crate::error::Result;
use crate::updates::{CancelToken, HelperLauncher, Transport, UpdateSession, Version, VERSION};

/// Loaded configuration plus the pieces every command may need.
#[derive(Clone)]
pub struct CommandContext {
    config: UpdaterConfig,
    cancel: CancelToken,
    current: Version,
    transport: Option<Arc<dyn Transport>>,
    launcher: Option<Rc<dyn HelperLauncher>>,
}

impl CommandContext {
    /// Create a context for the running build.
    pub fn new(config: UpdaterConfig, cancel: CancelToken) -> Self {
        Self {
            config,
            cancel,
            current: Version::parse(VERSION),
            transport: None,
            launcher: None,
        }
    }

    /// Use `transport` instead of HTTPS.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Start replacement helpers with `launcher` instead of the OS.
    pub fn with_launcher(mut self, launcher: Rc<dyn HelperLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Pretend to be `version`.
    pub fn with_current_version(mut self, version: Version) -> Self {
        self.current = version;
        self
    }

    /// The effective configuration.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Version of the running build.
    pub fn current_version(&self) -> &Version {
        &self.current
    }

    /// Cancellation signal shared with the Ctrl-C handler.
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// Open an update session.
    pub fn open_session(&self) -> Result<UpdateSession> {
        let session = match &self.transport {
            Some(transport) => UpdateSession::with_transport(
                &self.config,
                self.current.clone(),
                transport.clone(),
            )?,
            None => UpdateSession::new(&self.config, self.current.clone())?,
        };
        Ok(match &self.launcher {
            Some(launcher) => session.with_launcher(Box::new(Rc::clone(launcher))),
            None => session,
        })
    }
}
