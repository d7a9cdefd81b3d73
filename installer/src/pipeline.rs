//! Stage, install, resolve, and redirect: one editable install end to end.
//!
//! The steps run strictly in sequence. pip runs to completion before any
//! artifact is read, and the staging directory outlives the redirection so
//! that every exit path, successful, failed or interrupted, ends with its
//! removal.

use crate::error::Result;
use crate::interrupt;
use crate::invoker::{CommandExecutor, PipInvoker};
use crate::output::{
    patched_message, replacing_message, residue_message, site_message, success_message,
    write_stderr_line,
};
use crate::redirect::{PatchReport, Redirector};
use crate::request::PackageRequest;
use crate::site::{SiteLocator, resolve_site_directory};
use crate::stager::{Stager, StagingDirectory};
use log::{info, warn};
use std::io::Write;

/// Collaborators for an install run.
pub struct InstallContext<'a> {
    /// Runs pip.
    pub executor: &'a dyn CommandExecutor,
    /// Reports where pip installed to.
    pub site_locator: &'a dyn SiteLocator,
    /// Creates the staging directory.
    pub stager: &'a Stager,
    /// Interpreter pip is run with.
    pub python: &'a str,
}

/// What an install run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A regular install; nothing needed redirecting.
    Installed,
    /// An editable install whose artifacts were redirected.
    Redirected(PatchReport),
}

/// Perform one install for `request`.
///
/// # Errors
///
/// Propagates staging, pip, site resolution, and redirection failures, and
/// returns [`crate::error::InstallerError::Interrupted`] when SIGINT or
/// SIGTERM arrives between steps. The staging directory is removed in every
/// case.
pub fn run_install(
    context: &InstallContext<'_>,
    request: &PackageRequest,
    stderr: &mut dyn Write,
) -> Result<InstallOutcome> {
    let staging = context.stager.stage(request)?;
    interrupt::check()?;

    PipInvoker::new(context.executor, context.python).install(request, staging.staged_path())?;

    if !request.editable() {
        info!("non-editable install; nothing to redirect");
        close_staging(staging);
        return Ok(InstallOutcome::Installed);
    }

    let site = resolve_site_directory(context.site_locator, request.user_scope_requested())?;
    interrupt::check()?;
    info!("pip installed into the {} site", site.scope());
    write_stderr_line(stderr, site_message(site.path()));
    write_stderr_line(
        stderr,
        replacing_message(staging.staged_path(), request.original_path()),
    );

    let report =
        Redirector::new(&staging.aliases(), request.original_path()).redirect(site.path())?;
    report_patches(&report, request, stderr);

    close_staging(staging);
    Ok(InstallOutcome::Redirected(report))
}

fn report_patches(report: &PatchReport, request: &PackageRequest, stderr: &mut dyn Write) {
    for artifact in &report.patched {
        write_stderr_line(stderr, patched_message(artifact.kind, &artifact.path));
    }
    for path in &report.residual {
        write_stderr_line(stderr, residue_message(path));
    }
    write_stderr_line(
        stderr,
        success_message(report.len(), request.original_path()),
    );
}

fn close_staging(staging: StagingDirectory) {
    let staged = staging.staged_path().to_owned();
    if let Err(e) = staging.close() {
        warn!("failed to remove staging directory {staged}: {e}");
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
