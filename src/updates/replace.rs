//! Replacement of the running executable.
//!
//! A process cannot reliably overwrite its own executable, so the swap is
//! done by a short helper script that outlives the application:
//!
//! 1. wait [`STARTUP_DELAY`] for the application to exit, then give up
//!    without touching anything if the staged artifact has disappeared
//! 2. delete the old executable, retrying up to [`DELETE_ATTEMPTS`] times
//!    [`RETRY_BACKOFF`] apart; give up (leaving both files) if it never goes
//! 3. move the staged artifact into the vacated path
//! 4. relaunch the application
//! 5. remove the marker and the script itself, then the folder if empty
//!
//! The staged artifact is only removed after the move succeeded, and the old
//! executable is only deleted once the artifact has been seen in place. Once the
//! helper is running nothing reports back to the application; failures are
//! written to the helper transcript and the exit codes in [`HelperFailure`].

use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::time::Duration;

use crate::error::{Result, UpdraftError};

use super::staging::{StagingFolder, MARKER_NAME};

/// Time given to the application to exit and release its executable.
pub const STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Attempts at deleting the old executable before giving up.
pub const DELETE_ATTEMPTS: u32 = 5;

/// Pause between delete attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Terminal failures of the helper, reported as its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperFailure {
    /// The old executable could not be deleted; nothing was changed.
    DeleteRetriesExhausted,
    /// The old executable was deleted but the artifact could not be moved
    /// into place; the artifact is left in the staging folder.
    MoveFailed,
    /// The staged artifact was gone when the helper started; nothing was changed.
    ArtifactVanished,
}

impl HelperFailure {
    /// Exit code the helper uses for this failure.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::DeleteRetriesExhausted => 10,
            Self::MoveFailed => 11,
            Self::ArtifactVanished => 12,
        }
    }

    /// Map a helper exit code back to a failure.
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(Self::DeleteRetriesExhausted),
            11 => Some(Self::MoveFailed),
            12 => Some(Self::ArtifactVanished),
            _ => None,
        }
    }

    /// What the user should do about it.
    pub fn description(self) -> &'static str {
        match self {
            Self::DeleteRetriesExhausted => {
                "the old executable was still locked; the installed version is unchanged"
            }
            Self::MoveFailed => {
                "the new executable could not be moved into place; it is still in the staging folder"
            }
            Self::ArtifactVanished => {
                "the downloaded update was removed before it could be installed; the installed version is unchanged"
            }
        }
    }
}

/// Script language of the helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// Windows batch file run by `cmd.exe`.
    Batch,
    /// POSIX shell script run by `/bin/sh`.
    Posix,
}

impl ScriptFlavor {
    /// The flavor for the platform this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Batch
        } else {
            Self::Posix
        }
    }
}

/// Everything the helper needs to swap the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPlan {
    /// Executable being replaced (and relaunched).
    pub target: PathBuf,
    /// Downloaded replacement.
    pub artifact: PathBuf,
    /// Folder emptied and removed after a successful swap.
    pub staging_dir: PathBuf,
    /// Where the helper script is written.
    pub script: PathBuf,
    /// Arguments passed to the relaunched application.
    pub relaunch_args: Vec<String>,
    /// Wait before the first delete attempt.
    pub startup_delay: Duration,
    /// Delete attempts before giving up.
    pub delete_attempts: u32,
    /// Pause between delete attempts.
    pub retry_backoff: Duration,
}

impl ReplacementPlan {
    /// Plan replacing `target` with the artifact staged in `staging`.
    pub fn new(target: impl Into<PathBuf>, staging: &StagingFolder) -> Self {
        Self {
            target: target.into(),
            artifact: staging.artifact_path(),
            staging_dir: staging.root().to_path_buf(),
            script: staging.script_path(),
            relaunch_args: Vec::new(),
            startup_delay: STARTUP_DELAY,
            delete_attempts: DELETE_ATTEMPTS,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    /// Set the arguments for the relaunched application.
    pub fn with_relaunch_args(mut self, args: Vec<String>) -> Self {
        self.relaunch_args = args;
        self
    }

    /// Render the helper script.
    ///
    /// Fails with [`UpdraftError::InvalidArgument`] when a path or argument
    /// cannot be embedded safely in the script language.
    pub fn render(&self, flavor: ScriptFlavor) -> Result<String> {
        match flavor {
            ScriptFlavor::Batch => self.render_batch(),
            ScriptFlavor::Posix => Ok(self.render_posix()),
        }
    }

    fn render_posix(&self) -> String {
        let delay = self.startup_delay.as_secs().max(1);
        let backoff = self.retry_backoff.as_secs().max(1);
        let attempts = self.delete_attempts.max(1);
        let args: String = self
            .relaunch_args
            .iter()
            .map(|a| format!(" {}", sh_quote(a)))
            .collect();

        let mut s = String::new();
        let mut line = |text: &str| {
            s.push_str(text);
            s.push('\n');
        };

        line("#!/bin/sh");
        line("# Generated by updraft: replaces the application once it has exited.");
        line(&format!("TARGET={}", sh_quote(&self.target.to_string_lossy())));
        line(&format!("ARTIFACT={}", sh_quote(&self.artifact.to_string_lossy())));
        line(&format!("STAGING={}", sh_quote(&self.staging_dir.to_string_lossy())));
        line("");
        line(&format!(
            "echo \"updraft helper: waiting {}s for the application to exit\"",
            delay
        ));
        line(&format!("sleep {}", delay));
        line("");
        line("if [ ! -s \"$ARTIFACT\" ]; then");
        line("    echo \"updraft helper: $ARTIFACT is missing or empty; update aborted\"");
        line(&format!("    exit {}", HelperFailure::ArtifactVanished.exit_code()));
        line("fi");
        line("");
        line("attempt=1");
        line("while [ -e \"$TARGET\" ]; do");
        line("    rm -f \"$TARGET\" 2>/dev/null && break");
        line(&format!("    if [ \"$attempt\" -ge {} ]; then", attempts));
        line(&format!(
            "        echo \"updraft helper: could not delete $TARGET after {} attempts; update aborted\"",
            attempts
        ));
        line(&format!(
            "        exit {}",
            HelperFailure::DeleteRetriesExhausted.exit_code()
        ));
        line("    fi");
        line(&format!(
            "    echo \"updraft helper: delete attempt $attempt failed; retrying in {}s\"",
            backoff
        ));
        line("    attempt=$((attempt + 1))");
        line(&format!("    sleep {}", backoff));
        line("done");
        line("");
        line("if ! mv -f \"$ARTIFACT\" \"$TARGET\"; then");
        line("    echo \"updraft helper: could not move $ARTIFACT to $TARGET; staged artifact kept\"");
        line(&format!("    exit {}", HelperFailure::MoveFailed.exit_code()));
        line("fi");
        line("chmod 755 \"$TARGET\" 2>/dev/null");
        line("");
        line("echo \"updraft helper: relaunching $TARGET\"");
        line(&format!("nohup \"$TARGET\"{} >/dev/null 2>&1 &", args));
        line("");
        line(&format!("rm -f \"$STAGING/{}\"", MARKER_NAME));
        line("rm -f \"$0\"");
        line("rmdir \"$STAGING\" 2>/dev/null");
        line("exit 0");
        s
    }

    fn render_batch(&self) -> Result<String> {
        let target = batch_path(&self.target)?;
        let artifact = batch_path(&self.artifact)?;
        let staging = batch_path(&self.staging_dir)?;
        let mut args = String::new();
        for arg in &self.relaunch_args {
            check_batch_safe(arg)?;
            write!(args, " \"{}\"", arg).ok();
        }

        // `timeout` refuses to run without a console, so ping provides the sleep.
        let delay_pings = self.startup_delay.as_secs().max(1) + 1;
        let backoff_pings = self.retry_backoff.as_secs().max(1) + 1;
        let attempts = self.delete_attempts.max(1);

        let lines = [
            "@echo off".to_string(),
            "rem Generated by updraft: replaces the application once it has exited.".to_string(),
            "setlocal".to_string(),
            format!("set \"TARGET={}\"", target),
            format!("set \"ARTIFACT={}\"", artifact),
            format!("set \"STAGING={}\"", staging),
            String::new(),
            format!(
                "echo updraft helper: waiting {}s for the application to exit",
                delay_pings - 1
            ),
            format!("ping -n {} 127.0.0.1 >nul", delay_pings),
            String::new(),
            "if not exist \"%ARTIFACT%\" goto artifact_missing".to_string(),
            String::new(),
            "set /a ATTEMPT=1".to_string(),
            ":delete".to_string(),
            "if not exist \"%TARGET%\" goto move".to_string(),
            "del /f /q \"%TARGET%\" >nul 2>&1".to_string(),
            "if not exist \"%TARGET%\" goto move".to_string(),
            format!("if %ATTEMPT% geq {} goto delete_failed", attempts),
            format!(
                "echo updraft helper: delete attempt %ATTEMPT% failed; retrying in {}s",
                backoff_pings - 1
            ),
            "set /a ATTEMPT+=1".to_string(),
            format!("ping -n {} 127.0.0.1 >nul", backoff_pings),
            "goto delete".to_string(),
            String::new(),
            ":delete_failed".to_string(),
            format!(
                "echo updraft helper: could not delete \"%TARGET%\" after {} attempts; update aborted",
                attempts
            ),
            format!(
                "exit /b {}",
                HelperFailure::DeleteRetriesExhausted.exit_code()
            ),
            String::new(),
            ":move".to_string(),
            "move /y \"%ARTIFACT%\" \"%TARGET%\" >nul".to_string(),
            "if errorlevel 1 goto move_failed".to_string(),
            "echo updraft helper: relaunching \"%TARGET%\"".to_string(),
            format!("start \"\" \"%TARGET%\"{}", args),
            format!(
                "(goto) 2>nul & del /f /q \"%STAGING%\\{}\" & del /f /q \"%~f0\" & rmdir \"%STAGING%\"",
                MARKER_NAME
            ),
            String::new(),
            ":artifact_missing".to_string(),
            "echo updraft helper: \"%ARTIFACT%\" is missing; update aborted".to_string(),
            format!("exit /b {}", HelperFailure::ArtifactVanished.exit_code()),
            String::new(),
            ":move_failed".to_string(),
            "echo updraft helper: could not move \"%ARTIFACT%\" to \"%TARGET%\"; staged artifact kept"
                .to_string(),
            format!("exit /b {}", HelperFailure::MoveFailed.exit_code()),
        ];

        let mut script = lines.join("\r\n");
        script.push_str("\r\n");
        Ok(script)
    }
}

/// Single-quote `value` for a POSIX shell.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn check_batch_safe(value: &str) -> Result<()> {
    if value.contains(['"', '%', '\r', '\n']) {
        return Err(UpdraftError::invalid_argument(format!(
            "'{}' cannot be used in a helper script",
            value
        )));
    }
    Ok(())
}

fn batch_path(path: &Path) -> Result<String> {
    let text = path.to_string_lossy().into_owned();
    check_batch_safe(&text)?;
    Ok(text)
}

/// Starts the helper script as an independent process.
pub trait HelperLauncher {
    /// Launch `script`, sending its output to `transcript`.
    ///
    /// Must return without waiting for the helper to finish.
    fn launch(&self, script: &Path, flavor: ScriptFlavor, transcript: &Path) -> Result<()>;
}

impl<L: HelperLauncher + ?Sized> HelperLauncher for Rc<L> {
    fn launch(&self, script: &Path, flavor: ScriptFlavor, transcript: &Path) -> Result<()> {
        (**self).launch(script, flavor, transcript)
    }
}

/// Launches helpers as detached, windowless OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

impl HelperLauncher for SystemLauncher {
    fn launch(&self, script: &Path, flavor: ScriptFlavor, transcript: &Path) -> Result<()> {
        let log = File::create(transcript)?;
        let log_err = log.try_clone()?;

        let mut command = match flavor {
            ScriptFlavor::Batch => {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(script);
                c
            }
            ScriptFlavor::Posix => {
                let mut c = Command::new("/bin/sh");
                c.arg(script);
                c
            }
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn()?;
        tracing::info!(
            "Launched replacement helper (pid {}), transcript at {}",
            child.id(),
            transcript.display()
        );
        Ok(())
    }
}

/// Write the helper script for `plan` and launch it.
///
/// The artifact must already exist; the caller should exit soon after this
/// returns so the helper can delete the old executable.
pub fn hand_off(
    plan: &ReplacementPlan,
    flavor: ScriptFlavor,
    launcher: &dyn HelperLauncher,
    transcript: &Path,
) -> Result<()> {
    let has_artifact = fs::metadata(&plan.artifact)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if !has_artifact {
        return Err(UpdraftError::ArtifactMissing {
            path: plan.artifact.clone(),
        });
    }

    let script = plan.render(flavor)?;
    fs::write(&plan.script, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&plan.script, fs::Permissions::from_mode(0o755))?;
    }

    tracing::debug!(
        "Helper will replace {} with {}",
        plan.target.display(),
        plan.artifact.display()
    );
    launcher.launch(&plan.script, flavor, transcript)
}
