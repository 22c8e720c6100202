//! Install method detection.
//!
//! An executable owned by a package manager must be upgraded through that
//! package manager; swapping it in place would leave the manager's records
//! pointing at a different build.

use std::env;
use std::path::{Path, PathBuf};

/// How an executable was installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMethod {
    /// Installed via `cargo install`
    Cargo,
    /// Installed via Homebrew
    Homebrew,
    /// Downloaded binary or built from source
    Manual { path: PathBuf },
    /// Could not determine install method
    Unknown,
}

impl InstallMethod {
    /// The package manager command that upgrades `package`, if any.
    pub fn update_command(&self, package: &str) -> Option<String> {
        match self {
            InstallMethod::Cargo => Some(format!("cargo install {} --force", package)),
            InstallMethod::Homebrew => Some(format!("brew upgrade {}", package)),
            InstallMethod::Manual { .. } | InstallMethod::Unknown => None,
        }
    }

    /// Whether the executable may be replaced in place.
    pub fn supports_self_replace(&self) -> bool {
        matches!(self, InstallMethod::Manual { .. })
    }

    /// Get a human-readable name for this install method.
    pub fn name(&self) -> &str {
        match self {
            InstallMethod::Cargo => "cargo",
            InstallMethod::Homebrew => "homebrew",
            InstallMethod::Manual { .. } => "manual",
            InstallMethod::Unknown => "unknown",
        }
    }
}

/// Detect how the running executable was installed.
pub fn detect_install_method() -> InstallMethod {
    match env::current_exe() {
        Ok(path) => detect_install_method_for(&path),
        Err(e) => {
            tracing::debug!("Cannot locate running executable: {}", e);
            InstallMethod::Unknown
        }
    }
}

/// Detect how the executable at `exe_path` was installed.
pub fn detect_install_method_for(exe_path: &Path) -> InstallMethod {
    let cargo_home = env::var_os("CARGO_HOME").map(PathBuf::from);
    classify(exe_path, dirs::home_dir().as_deref(), cargo_home.as_deref())
}

fn classify(exe_path: &Path, home: Option<&Path>, cargo_home: Option<&Path>) -> InstallMethod {
    if is_cargo_install(exe_path, home, cargo_home) {
        return InstallMethod::Cargo;
    }

    if is_homebrew_install(exe_path) {
        return InstallMethod::Homebrew;
    }

    InstallMethod::Manual {
        path: exe_path.to_path_buf(),
    }
}

fn is_cargo_install(exe_path: &Path, home: Option<&Path>, cargo_home: Option<&Path>) -> bool {
    let default_bin = home.map(|h| h.join(".cargo").join("bin"));
    let custom_bin = cargo_home.map(|c| c.join("bin"));

    [default_bin, custom_bin]
        .into_iter()
        .flatten()
        .any(|bin| exe_path.starts_with(bin))
}

fn is_homebrew_install(exe_path: &Path) -> bool {
    const HOMEBREW_PREFIXES: [&str; 3] = [
        "/usr/local/Cellar/",          // Intel macOS
        "/opt/homebrew/Cellar/",       // ARM macOS
        "/home/linuxbrew/.linuxbrew/", // Linux
    ];

    let exe_str = exe_path.to_string_lossy();
    HOMEBREW_PREFIXES
        .iter()
        .any(|prefix| exe_str.starts_with(prefix))
}
