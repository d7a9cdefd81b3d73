//! Parsed representation of a single editable-install request.
//!
//! The package path given on the command line may carry a pip extras
//! qualifier on its final segment (`/ro/mypkg[dev,test]`). The qualifier is
//! not part of the directory name: it is split off here and re-appended to
//! the staged path when pip is invoked.

use crate::error::{InstallerError, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Argument that asks pip for a user-scope install.
const USER_FLAG: &str = "--user";

/// An immutable description of what to install and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    original_path: Utf8PathBuf,
    extras: Option<String>,
    editable: bool,
    user_scope_requested: bool,
    installer_args: Vec<String>,
}

impl PackageRequest {
    /// Parse a package path and the arguments forwarded to pip.
    ///
    /// Relative paths are made absolute against the current directory, since
    /// the rewritten artifacts must remain valid from any working directory.
    /// `.` and `..` segments are then resolved lexically, so `.` names the
    /// current directory and `pkg/..[dev]` names its parent. Symlinks are not
    /// followed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidPackagePath`] if the resolved path has
    /// no final segment, the segment is only an extras qualifier, or the
    /// absolute path is not valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use ro_editable::request::PackageRequest;
    ///
    /// let request = PackageRequest::parse("/ro/mypkg[dev]", true, vec!["--user".to_owned()])?;
    /// assert_eq!(request.original_path(), Utf8Path::new("/ro/mypkg"));
    /// assert_eq!(request.extras(), Some("[dev]"));
    /// assert!(request.user_scope_requested());
    /// # Ok::<(), ro_editable::error::InstallerError>(())
    /// ```
    pub fn parse(raw_path: &str, editable: bool, installer_args: Vec<String>) -> Result<Self> {
        let invalid = |reason: &str| InstallerError::InvalidPackagePath {
            path: raw_path.to_owned(),
            reason: reason.to_owned(),
        };

        let path = Utf8Path::new(raw_path);
        let (base, extras) = match path.components().next_back() {
            Some(Utf8Component::Normal(segment)) => match segment.split_once('[') {
                Some((name, rest)) => {
                    if name.is_empty() {
                        return Err(invalid("missing package directory before extras"));
                    }
                    let parent = path.parent().unwrap_or_else(|| Utf8Path::new(""));
                    (parent.join(name), Some(format!("[{rest}")))
                }
                None => (path.to_owned(), None),
            },
            _ => (path.to_owned(), None),
        };

        let absolute = absolutize(&base).map_err(|reason| invalid(&reason))?;
        let original_path = normalize_lexically(&absolute);
        if original_path.file_name().is_none() {
            return Err(invalid("path has no final component"));
        }
        let user_scope_requested = installer_args.iter().any(|arg| arg == USER_FLAG);

        Ok(Self {
            original_path,
            extras,
            editable,
            user_scope_requested,
            installer_args,
        })
    }

    /// Check that the source directory exists and is a directory.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::SourceNotFound`] when nothing exists at the
    /// path, or [`InstallerError::InvalidPackagePath`] when it is not a
    /// directory.
    pub fn ensure_source_exists(&self) -> Result<()> {
        if !self.original_path.exists() {
            return Err(InstallerError::SourceNotFound {
                path: self.original_path.clone(),
            });
        }
        if !self.original_path.is_dir() {
            return Err(InstallerError::InvalidPackagePath {
                path: self.original_path.to_string(),
                reason: "not a directory".to_owned(),
            });
        }
        Ok(())
    }

    /// Absolute path of the package source, without extras.
    #[must_use]
    pub fn original_path(&self) -> &Utf8Path {
        &self.original_path
    }

    /// Directory name of the package, used to name the staged copy.
    #[must_use]
    pub fn package_dir_name(&self) -> &str {
        self.original_path.file_name().unwrap_or_default()
    }

    /// The bracketed extras qualifier, if one was given.
    #[must_use]
    pub fn extras(&self) -> Option<&str> {
        self.extras.as_deref()
    }

    /// Whether pip should be run with `--editable`.
    #[must_use]
    pub const fn editable(&self) -> bool {
        self.editable
    }

    /// Whether `--user` appears among the forwarded arguments.
    #[must_use]
    pub const fn user_scope_requested(&self) -> bool {
        self.user_scope_requested
    }

    /// Arguments forwarded verbatim to `pip install`.
    #[must_use]
    pub fn installer_args(&self) -> &[String] {
        &self.installer_args
    }

    /// The install target for pip: the staged path with extras re-appended.
    #[must_use]
    pub fn install_target(&self, staged_path: &Utf8Path) -> String {
        format!("{staged_path}{}", self.extras().unwrap_or_default())
    }
}

fn absolutize(path: &Utf8Path) -> std::result::Result<Utf8PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let absolute = std::path::absolute(path.as_std_path()).map_err(|e| e.to_string())?;
    Utf8PathBuf::try_from(absolute).map_err(|e| format!("path is not valid UTF-8: {e}"))
}

/// Drop `.` segments and fold each `..` into its parent without touching
/// the filesystem. `..` at the root stays at the root.
fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalized = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_str()),
        }
    }
    normalized
}
