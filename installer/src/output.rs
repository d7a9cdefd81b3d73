//! Diagnostic output for the `ro-editable` CLI.
//!
//! Everything the tool reports goes to the diagnostic stream, never stdout,
//! so pip's own output remains the only thing on the primary stream.

use crate::redirect::ArtifactKind;
use camino::Utf8Path;
use std::io::Write;

/// Write one line to the diagnostic stream, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Line announcing the resolved site-packages directory.
#[must_use]
pub fn site_message(site_dir: &Utf8Path) -> String {
    format!("SITE: {site_dir}")
}

/// Line announcing the substitution about to be performed.
#[must_use]
pub fn replacing_message(staging_path: &Utf8Path, original_path: &Utf8Path) -> String {
    format!("replacing {staging_path} with {original_path}")
}

/// Line reporting one rewritten artifact.
#[must_use]
pub fn patched_message(kind: ArtifactKind, path: &Utf8Path) -> String {
    format!("patched {kind}: {path}")
}

/// Warning for an artifact that still references the staging directory.
#[must_use]
pub fn residue_message(path: &Utf8Path) -> String {
    format!("warning: {path} still references the staging directory")
}

/// Summary line after a successful redirection.
#[must_use]
pub fn success_message(count: usize, original_path: &Utf8Path) -> String {
    let plural = if count == 1 { "artifact" } else { "artifacts" };
    format!("Redirected {count} {plural} to {original_path}")
}
