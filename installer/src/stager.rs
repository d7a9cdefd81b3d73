//! Staging of the package source into a writable temporary directory.
//!
//! The staged copy is what pip actually installs. It lives inside a
//! [`tempfile::TempDir`] owned by [`StagingDirectory`], so it is removed when
//! the guard is dropped on every exit path, including error returns.

use crate::error::{InstallerError, Result};
use crate::request::PackageRequest;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

/// Entry names never copied into the staged tree.
///
/// These are tool caches and vendored dependency directories that pip has no
/// use for and that can be large.
pub const IGNORED_NAMES: &[&str] = &[
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "__pycache__",
    "node_modules",
];

const TEMP_PREFIX: &str = "ro-editable-";

/// Creates staging directories.
#[derive(Debug, Clone, Default)]
pub struct Stager {
    base_dir: Option<Utf8PathBuf>,
}

impl Stager {
    /// Create a stager that uses the system temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stager that places staging directories under `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Copy the requested package into a fresh staging directory.
    ///
    /// The copy is named after the package directory (extras excluded),
    /// keeps symbolic links as links, and skips [`IGNORED_NAMES`].
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::SourceNotFound`] if the source is missing and
    /// [`InstallerError::StagingFailed`] if the temporary directory cannot be
    /// created or the copy fails.
    pub fn stage(&self, request: &PackageRequest) -> Result<StagingDirectory> {
        request.ensure_source_exists()?;

        let root = self.create_root()?;
        let root_path = Utf8Path::from_path(root.path()).ok_or_else(|| {
            InstallerError::StagingFailed {
                reason: format!(
                    "temporary directory {} is not valid UTF-8",
                    root.path().display()
                ),
            }
        })?;
        let staged_path = root_path.join(request.package_dir_name());

        debug!("staging {} into {staged_path}", request.original_path());
        copy_tree(request.original_path().as_std_path(), staged_path.as_std_path()).map_err(
            |e| InstallerError::StagingFailed {
                reason: format!(
                    "failed to copy {} to {staged_path}: {e}",
                    request.original_path()
                ),
            },
        )?;

        let canonical_path = fs::canonicalize(&staged_path)
            .ok()
            .and_then(|p| Utf8PathBuf::try_from(p).ok())
            .filter(|p| *p != staged_path);

        Ok(StagingDirectory {
            root,
            staged_path,
            canonical_path,
        })
    }

    fn create_root(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let created = match &self.base_dir {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        };
        created.map_err(|e| InstallerError::StagingFailed {
            reason: format!("failed to create temporary directory: {e}"),
        })
    }
}

/// A staged package copy, removed when dropped.
#[derive(Debug)]
pub struct StagingDirectory {
    root: TempDir,
    staged_path: Utf8PathBuf,
    canonical_path: Option<Utf8PathBuf>,
}

impl StagingDirectory {
    /// Path of the staged package copy handed to pip.
    #[must_use]
    pub fn staged_path(&self) -> &Utf8Path {
        &self.staged_path
    }

    /// Every spelling of the staged path pip may have recorded.
    ///
    /// This is the staged path itself followed by its canonical form when the
    /// temporary directory is reached through a symlink (as `/tmp` is on
    /// macOS).
    #[must_use]
    pub fn aliases(&self) -> Vec<&Utf8Path> {
        let mut aliases = vec![self.staged_path.as_path()];
        aliases.extend(self.canonical_path.as_deref());
        aliases
    }

    /// Remove the staging directory, reporting any failure.
    ///
    /// Dropping the value also removes it but discards errors.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory could not be removed.
    pub fn close(self) -> Result<()> {
        self.root.close().map_err(InstallerError::from)
    }
}

fn is_ignored(name: &OsStr) -> bool {
    IGNORED_NAMES.iter().any(|ignored| name == *ignored)
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if is_ignored(&name) {
            trace!("skipping ignored entry {}", entry.path().display());
            continue;
        }

        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(windows)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    if fs::metadata(src).is_ok_and(|m| m.is_dir()) {
        std::os::windows::fs::symlink_dir(target, dst)
    } else {
        std::os::windows::fs::symlink_file(target, dst)
    }
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
