//! Resolution of the site-packages directory pip installed into.
//!
//! The directory is discovered after pip has run, never chosen up front: pip
//! may fall back to a user-scope install (for example when not running as
//! root) whatever was requested. The facts come from a [`SiteLocator`], which
//! in production asks the interpreter itself through a short Python probe.

use crate::error::{InstallerError, Result};
use crate::invoker::CommandExecutor;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::fmt;

/// Python source of the site probe.
///
/// `sys.argv[1]` is `1` when `--user` was forwarded to pip. The probe asks
/// pip's own `decide_user_install` so the answer matches what pip just did.
pub const SITE_PROBE_SCRIPT: &str = r#"import json, site, sys
from pip._internal.commands.install import decide_user_install
forced = sys.argv[1] == "1"
user_install = decide_user_install(use_user_site=True if forced else None)
try:
    system_sites = site.getsitepackages()
except AttributeError:
    system_sites = []
json.dump({
    "user_install": bool(user_install),
    "user_site": site.getusersitepackages(),
    "system_sites": list(system_sites),
}, sys.stdout)
"#;

/// Raw facts about the interpreter's site-packages layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteProbe {
    /// Whether pip decided on a user-scope install.
    pub user_install: bool,
    /// The user site-packages directory, if the interpreter has one.
    #[serde(default)]
    pub user_site: Option<Utf8PathBuf>,
    /// Every system site-packages directory.
    #[serde(default)]
    pub system_sites: Vec<Utf8PathBuf>,
}

/// Source of site-packages facts for the active interpreter.
#[cfg_attr(test, mockall::automock)]
pub trait SiteLocator {
    /// Report the site layout and pip's scope decision.
    ///
    /// `user_scope_forced` is true when `--user` was passed to pip.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::SiteQueryFailed`] when the facts cannot be
    /// obtained.
    fn probe(&self, user_scope_forced: bool) -> Result<SiteProbe>;
}

/// Which scope an install landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteScope {
    /// The per-user site-packages directory.
    User,
    /// The interpreter-wide site-packages directory.
    System,
}

impl SiteScope {
    const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl fmt::Display for SiteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The directory pip actually installed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDirectory {
    path: Utf8PathBuf,
    scope: SiteScope,
}

impl SiteDirectory {
    /// Path of the site-packages directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Scope the install landed in.
    #[must_use]
    pub const fn scope(&self) -> SiteScope {
        self.scope
    }
}

/// Determine the site-packages directory pip used.
///
/// # Errors
///
/// Returns [`InstallerError::NoSiteDirectory`] if the resolved scope has no
/// directory, [`InstallerError::AmbiguousSiteDirectory`] if the system scope
/// has several, and propagates probe failures.
pub fn resolve_site_directory(
    locator: &dyn SiteLocator,
    user_scope_forced: bool,
) -> Result<SiteDirectory> {
    let probe = locator.probe(user_scope_forced)?;
    debug!("site probe: {probe:?}");

    if probe.user_install {
        let path = probe.user_site.ok_or(InstallerError::NoSiteDirectory {
            scope: SiteScope::User.as_str(),
        })?;
        return Ok(SiteDirectory {
            path,
            scope: SiteScope::User,
        });
    }

    let mut candidates = probe.system_sites;
    match candidates.len() {
        0 => Err(InstallerError::NoSiteDirectory {
            scope: SiteScope::System.as_str(),
        }),
        1 => Ok(SiteDirectory {
            path: candidates.remove(0),
            scope: SiteScope::System,
        }),
        _ => Err(InstallerError::AmbiguousSiteDirectory { candidates }),
    }
}

/// Asks a Python interpreter for its site layout.
pub struct PythonSiteLocator<'a> {
    executor: &'a dyn CommandExecutor,
    python: &'a str,
}

impl<'a> PythonSiteLocator<'a> {
    /// Create a locator that runs the probe with `python`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, python: &'a str) -> Self {
        Self { executor, python }
    }

    fn query_failed(&self, reason: impl Into<String>) -> InstallerError {
        InstallerError::SiteQueryFailed {
            python: self.python.to_owned(),
            reason: reason.into(),
        }
    }
}

impl SiteLocator for PythonSiteLocator<'_> {
    fn probe(&self, user_scope_forced: bool) -> Result<SiteProbe> {
        let forced = if user_scope_forced { "1" } else { "0" };
        let args = [
            "-c".to_owned(),
            SITE_PROBE_SCRIPT.to_owned(),
            forced.to_owned(),
        ];

        let output = self
            .executor
            .run(self.python, &args)
            .map_err(|e| self.query_failed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.query_failed(stderr.trim()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| self.query_failed(format!("unreadable probe output: {e}")))
    }
}

#[cfg(test)]
#[path = "site_tests.rs"]
mod tests;
