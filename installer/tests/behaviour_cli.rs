//! End-to-end CLI behaviour tests for `ro-editable`.
//!
//! These scenarios run the binary and check exit codes and stderr for the
//! failures that occur before pip is ever started, and for an install that is
//! interrupted while pip runs.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

#[derive(Default)]
struct CliWorld {
    args: RefCell<Vec<String>>,
    envs: RefCell<Vec<(String, PathBuf)>>,
    scratch: RefCell<Option<PathBuf>>,
    output: RefCell<Option<Output>>,
    // Keep temp_dir alive for the lifetime of the scenario.
    _temp_dir: RefCell<Option<TempDir>>,
}

#[fixture]
fn cli_world() -> CliWorld {
    CliWorld::default()
}

/// Helper function to retrieve the command output from the CLI world.
fn get_output(cli_world: &CliWorld) -> std::cell::Ref<'_, Output> {
    let output = cli_world.output.borrow();
    std::cell::Ref::map(output, |opt| opt.as_ref().expect("output not set"))
}

fn stderr_text(cli_world: &CliWorld) -> String {
    String::from_utf8_lossy(&get_output(cli_world).stderr).into_owned()
}

#[given("the CLI is invoked with a missing package path")]
fn given_missing_package_path(cli_world: &CliWorld) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let missing = temp_dir.path().join("absent-pkg");
    cli_world
        .args
        .replace(vec![missing.to_string_lossy().into_owned()]);
    cli_world._temp_dir.replace(Some(temp_dir));
}

#[given("the CLI is invoked without a package path")]
fn given_no_package_path(cli_world: &CliWorld) {
    cli_world.args.replace(vec!["--no-editable".to_owned()]);
}

#[when("the CLI is run")]
fn when_cli_run(cli_world: &CliWorld) {
    let args = cli_world.args.borrow();
    let output = Command::new(env!("CARGO_BIN_EXE_ro-editable"))
        .args(args.iter())
        // Point pip at an interpreter that cannot exist so a regression that
        // reaches the install step fails loudly instead of installing.
        .env("RO_EDITABLE_PYTHON", "ro-editable-no-such-python")
        .envs(cli_world.envs.borrow().iter().cloned())
        .output()
        .expect("failed to run ro-editable");
    cli_world.output.replace(Some(output));
}

#[then("the CLI exits with status 1")]
fn then_exits_with_one(cli_world: &CliWorld) {
    let output = get_output(cli_world);
    assert_eq!(output.status.code(), Some(1), "unexpected status {}", output.status);
}

#[then("the CLI exits with status 130")]
fn then_exits_with_interrupted(cli_world: &CliWorld) {
    let output = get_output(cli_world);
    assert_eq!(output.status.code(), Some(130), "unexpected status {}", output.status);
}

#[then("no staging directory is left behind")]
fn then_no_staging_left(cli_world: &CliWorld) {
    let scratch = cli_world.scratch.borrow();
    let scratch = scratch.as_ref().expect("scratch dir not set");
    let leftovers: Vec<_> = std::fs::read_dir(scratch)
        .expect("failed to read scratch dir")
        .map(|entry| entry.expect("bad dir entry").path())
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

#[then("the CLI exits with status 2")]
fn then_exits_with_two(cli_world: &CliWorld) {
    let output = get_output(cli_world);
    assert_eq!(output.status.code(), Some(2), "unexpected status {}", output.status);
}

#[then("stderr mentions that the path does not exist")]
fn then_stderr_mentions_missing_path(cli_world: &CliWorld) {
    let stderr = stderr_text(cli_world);
    assert!(stderr.starts_with("error: source path"), "stderr: {stderr}");
    assert!(stderr.contains("absent-pkg does not exist"), "stderr: {stderr}");
}

#[then("stderr shows usage")]
fn then_stderr_shows_usage(cli_world: &CliWorld) {
    let stderr = stderr_text(cli_world);
    assert!(stderr.contains("Usage:"), "stderr: {stderr}");
    assert!(stderr.contains("<PATH>"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// Interruption (Unix only - relies on delivering SIGINT)
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod interruption {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    const STAGING_TIMEOUT: Duration = Duration::from_secs(20);

    #[given("the interpreter hangs while pip installs")]
    pub fn given_hanging_interpreter(cli_world: &CliWorld) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let package = temp_dir.path().join("ro").join("mypkg");
        fs::create_dir_all(&package).expect("failed to create package");
        fs::write(package.join("setup.py"), "from setuptools import setup\nsetup()\n")
            .expect("failed to write setup.py");
        let scratch = temp_dir.path().join("scratch");
        fs::create_dir_all(&scratch).expect("failed to create scratch dir");

        let python = temp_dir.path().join("python");
        fs::write(&python, "#!/bin/sh\nexec sleep 30\n").expect("failed to write fake python");
        let mut perms = fs::metadata(&python)
            .expect("failed to get metadata")
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&python, perms).expect("failed to set permissions");

        cli_world
            .args
            .replace(vec![package.to_string_lossy().into_owned()]);
        cli_world.envs.replace(vec![
            ("RO_EDITABLE_PYTHON".to_owned(), python),
            ("TMPDIR".to_owned(), scratch.clone()),
        ]);
        cli_world.scratch.replace(Some(scratch));
        cli_world._temp_dir.replace(Some(temp_dir));
    }

    #[when("the CLI is interrupted during the install")]
    pub fn when_cli_interrupted(cli_world: &CliWorld) {
        let scratch = cli_world
            .scratch
            .borrow()
            .clone()
            .expect("scratch dir not set");
        let args = cli_world.args.borrow();
        let child = Command::new(env!("CARGO_BIN_EXE_ro-editable"))
            .args(args.iter())
            .envs(cli_world.envs.borrow().iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to run ro-editable");

        // The staging directory appears only after the handler is installed.
        let started = Instant::now();
        while fs::read_dir(&scratch)
            .expect("failed to read scratch dir")
            .next()
            .is_none()
        {
            assert!(
                started.elapsed() < STAGING_TIMEOUT,
                "staging directory never appeared"
            );
            std::thread::sleep(Duration::from_millis(20));
        }

        let pid = libc::pid_t::try_from(child.id()).expect("pid out of range");
        // SAFETY: `pid` is our own live child process.
        let sent = unsafe { libc::kill(pid, libc::SIGINT) };
        assert_eq!(sent, 0, "failed to send SIGINT");

        let output = child.wait_with_output().expect("failed to wait for ro-editable");
        cli_world.output.replace(Some(output));
    }
}

// Do not reorder scenarios in tests/features/ro_editable.feature; bindings
// are index-based.
#[scenario(path = "tests/features/ro_editable.feature", index = 5)]
fn scenario_missing_path_rejected(cli_world: CliWorld) {
    let _ = cli_world;
}

#[scenario(path = "tests/features/ro_editable.feature", index = 6)]
fn scenario_path_required(cli_world: CliWorld) {
    let _ = cli_world;
}

#[cfg(unix)]
#[scenario(path = "tests/features/ro_editable.feature", index = 7)]
fn scenario_interrupted_install_cleans_up(cli_world: CliWorld) {
    let _ = cli_world;
}
