//! The staging folder.
//!
//! One directory holds at most one downloaded artifact and the generated
//! replacement helper. It is created lazily, emptied at the start of every
//! download, and removed by the helper after relaunch or by
//! [`StagingFolder::remove`] on cleanup.
//!
//! A folder belongs to updraft once it carries [`MARKER_NAME`]. Only the
//! artifact, the helper script, partial downloads and the marker are ever
//! deleted; a folder holding anything else is left alone. An existing
//! folder is only claimed when it is empty.
//!
//! At most one download may be in flight per staging folder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpdraftError};

/// Default folder name under the system temp directory.
pub const DEFAULT_FOLDER_NAME: &str = "updraft-update";

/// File marking a folder as created by updraft.
pub const MARKER_NAME: &str = ".updraft-staging";

/// Name prefix of in-progress downloads.
pub const PARTIAL_PREFIX: &str = ".partial-";

#[cfg(windows)]
const SCRIPT_NAME: &str = "apply-update.cmd";
#[cfg(not(windows))]
const SCRIPT_NAME: &str = "apply-update.sh";

/// Location and layout of the staging folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingFolder {
    root: PathBuf,
    artifact_name: String,
}

impl StagingFolder {
    /// Create a handle for `root`, staging the artifact as `artifact_name`.
    ///
    /// Nothing is created on disk until [`ensure`](Self::ensure) or
    /// [`reset`](Self::reset).
    pub fn new(root: impl Into<PathBuf>, artifact_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            artifact_name: artifact_name.into(),
        }
    }

    /// `<temp>/updraft-update`.
    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_FOLDER_NAME)
    }

    /// The folder itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the downloaded executable is staged.
    pub fn artifact_path(&self) -> PathBuf {
        self.root.join(&self.artifact_name)
    }

    /// Where the replacement helper script is written.
    pub fn script_path(&self) -> PathBuf {
        self.root.join(SCRIPT_NAME)
    }

    /// Helper transcript, kept beside the folder so it survives the folder's removal.
    pub fn transcript_path(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string());
        self.root.with_file_name(format!("{}.log", name))
    }

    /// The ownership marker.
    pub fn marker_path(&self) -> PathBuf {
        self.root.join(MARKER_NAME)
    }

    /// Whether the folder carries the ownership marker.
    pub fn is_owned(&self) -> bool {
        self.marker_path().is_file()
    }

    /// Check that `root` may serve as a staging folder.
    ///
    /// It must be absolute, must not be a filesystem root, the home
    /// directory or the temp directory itself, and if it exists it must be
    /// a directory that is either empty or already marked as ours.
    pub fn check_root(root: &Path) -> Result<()> {
        let refuse = |reason: &str| UpdraftError::UnsafeStagingFolder {
            path: root.to_path_buf(),
            reason: reason.to_string(),
        };

        if !root.is_absolute() {
            return Err(refuse("it is not an absolute path"));
        }
        if root.parent().is_none() {
            return Err(refuse("it is a filesystem root"));
        }
        if dirs::home_dir().is_some_and(|home| same_path(root, &home)) {
            return Err(refuse("it is the home directory"));
        }
        if same_path(root, &std::env::temp_dir()) {
            return Err(refuse("it is the temp directory itself"));
        }

        match fs::read_dir(root) {
            Ok(mut entries) => {
                if root.join(MARKER_NAME).is_file() || entries.next().is_none() {
                    Ok(())
                } else {
                    Err(refuse("it already holds files updraft did not create"))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) if root.exists() && !root.is_dir() => {
                tracing::debug!("{} is not a directory: {}", root.display(), e);
                Err(refuse("it is not a directory"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create and mark the folder, or verify an existing one is ours.
    pub fn ensure(&self) -> Result<()> {
        Self::check_root(&self.root)?;
        if self.is_owned() {
            return Ok(());
        }
        fs::create_dir_all(&self.root)?;
        fs::write(self.marker_path(), "created by updraft; safe to delete\n")?;
        tracing::debug!("Claimed staging folder {}", self.root.display());
        Ok(())
    }

    /// Make sure the folder is ours and holds nothing but the marker.
    pub fn reset(&self) -> Result<()> {
        self.ensure()?;
        self.remove_owned_files()
    }

    /// Whether a non-empty artifact is staged.
    pub fn has_artifact(&self) -> bool {
        fs::metadata(self.artifact_path())
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Delete what updraft put in the folder, then the folder itself.
    ///
    /// Succeeds if the folder does not exist. A folder without the marker
    /// is refused untouched; one that still holds foreign files keeps them
    /// and fails.
    pub fn remove(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        if !self.is_owned() {
            return Err(UpdraftError::UnsafeStagingFolder {
                path: self.root.clone(),
                reason: "it was not created by updraft".to_string(),
            });
        }

        self.remove_owned_files()?;
        remove_file_if_present(&self.marker_path())?;
        match fs::remove_dir(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_owned_files(&self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == self.artifact_name.as_str()
                || name == SCRIPT_NAME
                || name.starts_with(PARTIAL_PREFIX)
            {
                remove_file_if_present(&entry.path())?;
            }
        }
        Ok(())
    }
}

fn remove_file_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    let canonical = |p: &Path| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    canonical(a) == canonical(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staging(temp: &TempDir) -> StagingFolder {
        StagingFolder::new(temp.path().join("updraft-update"), "app.exe")
    }

    #[test]
    fn layout_paths() {
        let folder = StagingFolder::new("/tmp/updraft-update", "app.exe");
        assert_eq!(
            folder.artifact_path(),
            PathBuf::from("/tmp/updraft-update/app.exe")
        );
        assert_eq!(folder.script_path().parent(), Some(folder.root()));
        assert_eq!(
            folder.transcript_path(),
            PathBuf::from("/tmp/updraft-update.log")
        );
    }

    #[test]
    fn default_root_is_under_temp() {
        let root = StagingFolder::default_root();
        assert!(root.starts_with(std::env::temp_dir()));
        assert!(root.ends_with(DEFAULT_FOLDER_NAME));
    }

    #[test]
    fn nothing_created_until_ensure() {
        let temp = TempDir::new().unwrap();
        let folder = staging(&temp);
        assert!(!folder.root().exists());

        folder.ensure().unwrap();
        assert!(folder.root().is_dir());
        assert!(folder.is_owned());
    }

    #[test]
    fn reset_removes_only_owned_files() {
        let temp = TempDir::new().unwrap();
        let folder = staging(&temp);
        folder.ensure().unwrap();
        fs::write(folder.artifact_path(), b"old").unwrap();
        fs::write(folder.script_path(), b"#!/bin/sh").unwrap();
        fs::write(folder.root().join(".partial-abc123"), b"half").unwrap();
        fs::write(folder.root().join("notes.txt"), b"keep me").unwrap();

        folder.reset().unwrap();

        assert!(!folder.artifact_path().exists());
        assert!(!folder.script_path().exists());
        assert!(!folder.root().join(".partial-abc123").exists());
        assert!(folder.root().join("notes.txt").exists());
        assert!(folder.is_owned());
    }

    #[test]
    fn claims_existing_empty_folder() {
        let temp = TempDir::new().unwrap();
        let folder = staging(&temp);
        fs::create_dir_all(folder.root()).unwrap();

        folder.reset().unwrap();

        assert!(folder.is_owned());
    }

    #[test]
    fn refuses_folder_with_foreign_files() {
        let temp = TempDir::new().unwrap();
        let documents = temp.path().join("Documents");
        fs::create_dir_all(&documents).unwrap();
        fs::write(documents.join("thesis.docx"), b"years of work").unwrap();
        let folder = StagingFolder::new(&documents, "app.exe");

        let err = folder.reset().unwrap_err();
        assert!(matches!(err, UpdraftError::UnsafeStagingFolder { .. }));

        let err = folder.remove().unwrap_err();
        assert!(matches!(err, UpdraftError::UnsafeStagingFolder { .. }));

        assert!(documents.join("thesis.docx").exists());
        assert!(!folder.is_owned());
    }

    #[test]
    fn check_root_rejects_dangerous_locations() {
        let temp = TempDir::new().unwrap();

        assert!(StagingFolder::check_root(Path::new("relative/stage")).is_err());
        assert!(StagingFolder::check_root(&std::env::temp_dir()).is_err());
        if let Some(home) = dirs::home_dir() {
            assert!(StagingFolder::check_root(&home).is_err());
        }
        let root = temp.path().ancestors().last().unwrap().to_path_buf();
        assert!(StagingFolder::check_root(&root).is_err());

        let file = temp.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(StagingFolder::check_root(&file).is_err());

        assert!(StagingFolder::check_root(&temp.path().join("fresh")).is_ok());
    }

    #[test]
    fn has_artifact_requires_non_empty_file() {
        let temp = TempDir::new().unwrap();
        let folder = staging(&temp);
        assert!(!folder.has_artifact());

        folder.ensure().unwrap();
        fs::write(folder.artifact_path(), b"").unwrap();
        assert!(!folder.has_artifact());

        fs::write(folder.artifact_path(), b"MZ").unwrap();
        assert!(folder.has_artifact());
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let folder = staging(&temp);

        folder.remove().unwrap();
        folder.ensure().unwrap();
        fs::write(folder.artifact_path(), b"new").unwrap();
        folder.remove().unwrap();
        folder.remove().unwrap();

        assert!(!folder.root().exists());
    }

    #[test]
    fn remove_keeps_foreign_files_in_owned_folder() {
        let temp = TempDir::new().unwrap();
        let folder = staging(&temp);
        folder.ensure().unwrap();
        fs::write(folder.artifact_path(), b"new").unwrap();
        fs::write(folder.root().join("notes.txt"), b"keep me").unwrap();

        assert!(folder.remove().is_err());

        assert!(folder.root().join("notes.txt").exists());
        assert!(!folder.artifact_path().exists());
    }
}
