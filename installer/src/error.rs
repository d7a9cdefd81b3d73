//! Error types for the `ro-editable` CLI.
//!
//! Each variant maps to one failure class of an editable install: bad input,
//! staging, the pip subprocess, site resolution, and artifact redirection.
//! Messages are written for the person running the tool.

use camino::Utf8PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while staging, installing, or redirecting a package.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The package source directory does not exist.
    #[error("source path {path} does not exist")]
    SourceNotFound {
        /// Path that was requested.
        path: Utf8PathBuf,
    },

    /// The package path could not be interpreted.
    #[error("invalid package path {path}: {reason}")]
    InvalidPackagePath {
        /// Path as given on the command line.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// Copying the source tree into the staging directory failed.
    #[error("staging failed: {reason}")]
    StagingFailed {
        /// Description of the staging failure.
        reason: String,
    },

    /// `pip install` exited unsuccessfully.
    #[error("pip install failed for {target} ({status})")]
    InstallFailed {
        /// The install target passed to pip, extras included.
        target: String,
        /// Exit status reported by the subprocess.
        status: ExitStatus,
    },

    /// The site-packages probe could not be run or decoded.
    #[error("failed to query site-packages from {python}: {reason}")]
    SiteQueryFailed {
        /// Interpreter used for the probe.
        python: String,
        /// Description of the failure.
        reason: String,
    },

    /// SIGINT or SIGTERM arrived before the install finished.
    #[error("interrupted; the staging directory was removed")]
    Interrupted,

    /// More than one system site-packages directory was reported.
    #[error(
        "refusing to guess the system site-packages directory; candidates: {}",
        format_candidates(candidates)
    )]
    AmbiguousSiteDirectory {
        /// Every candidate reported by the interpreter.
        candidates: Vec<Utf8PathBuf>,
    },

    /// No site-packages directory was reported for the resolved scope.
    #[error("no {scope} site-packages directory was reported by the interpreter")]
    NoSiteDirectory {
        /// Either `user` or `system`.
        scope: &'static str,
    },

    /// An artifact glob pattern could not be compiled.
    #[error("invalid artifact pattern {pattern}: {reason}")]
    PatternFailed {
        /// The offending pattern.
        pattern: String,
        /// Description of the parse error.
        reason: String,
    },

    /// Reading or rewriting an artifact failed.
    #[error("failed to patch {path}")]
    PatchFailed {
        /// Artifact being patched.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Editable install succeeded but no artifact referenced the staging path.
    #[error(
        "nothing was patched: no artifact under {site_dir} references {staging_path}; \
         pip may have changed its editable layout or installed elsewhere"
    )]
    NothingPatched {
        /// Site directory that was scanned.
        site_dir: Utf8PathBuf,
        /// Staging path that was searched for.
        staging_path: Utf8PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn format_candidates(candidates: &[Utf8PathBuf]) -> String {
    candidates
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
