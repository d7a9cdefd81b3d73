//! Invocation of `pip install` against the staged package.
//!
//! Subprocesses are run through the [`CommandExecutor`] trait so tests can
//! script pip's behaviour without a Python installation.

use crate::error::{InstallerError, Result};
use crate::interrupt;
use crate::request::PackageRequest;
use camino::Utf8Path;
use log::{debug, warn};
use std::process::{Child, Command, ExitStatus, Output};
use std::time::Duration;
use wait_timeout::ChildExt;

/// How often a streamed child is checked for a pending interruption.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ro_editable::invoker::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("python3", &["--version".to_owned()])?;
    /// assert!(output.status.success());
    /// # Ok::<(), ro_editable::error::InstallerError>(())
    /// ```
    fn run(&self, program: &str, args: &[String]) -> Result<Output>;

    /// Runs a command with inherited standard streams and returns its status.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or waiting for the
    /// command, and [`InstallerError::Interrupted`] if the process received
    /// SIGINT or SIGTERM while the command ran.
    fn run_streamed(&self, program: &str, args: &[String]) -> Result<ExitStatus>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        Command::new(program)
            .args(args)
            .output()
            .map_err(InstallerError::from)
    }

    fn run_streamed(&self, program: &str, args: &[String]) -> Result<ExitStatus> {
        interrupt::check()?;
        let mut child = Command::new(program).args(args).spawn()?;
        wait_interruptible(&mut child, interrupt::is_interrupted)
    }
}

/// Wait for `child`, killing it once `interrupted` reports true.
///
/// A child that exits on its own after an interruption (as pip does when the
/// terminal's SIGINT reaches the whole process group) is reported as
/// interrupted too, so the caller never mistakes it for an ordinary failure.
///
/// # Errors
///
/// Returns [`InstallerError::Interrupted`] after an interruption and any I/O
/// error raised while waiting.
pub fn wait_interruptible(
    child: &mut Child,
    interrupted: impl Fn() -> bool,
) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.wait_timeout(INTERRUPT_POLL)? {
            if interrupted() {
                return Err(InstallerError::Interrupted);
            }
            return Ok(status);
        }
        if interrupted() {
            warn!("interrupted; stopping child process {}", child.id());
            if let Err(e) = child.kill() {
                debug!("failed to kill child process: {e}");
            }
            child.wait()?;
            return Err(InstallerError::Interrupted);
        }
    }
}

/// Runs `python -m pip install` for a staged package.
pub struct PipInvoker<'a> {
    executor: &'a dyn CommandExecutor,
    python: &'a str,
}

impl<'a> PipInvoker<'a> {
    /// Create an invoker that runs pip through `python`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, python: &'a str) -> Self {
        Self { executor, python }
    }

    /// Install the staged copy described by `request`.
    ///
    /// pip's output is streamed to the user. The installer is not retried:
    /// its failures (bad metadata, unmet dependencies) are deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InstallFailed`] when pip exits unsuccessfully
    /// and an I/O error when it cannot be started.
    pub fn install(&self, request: &PackageRequest, staged_path: &Utf8Path) -> Result<()> {
        let args = pip_install_args(request, staged_path);
        debug!("running {} {}", self.python, args.join(" "));

        let status = self.executor.run_streamed(self.python, &args)?;
        if !status.success() {
            return Err(InstallerError::InstallFailed {
                target: request.install_target(staged_path),
                status,
            });
        }
        Ok(())
    }
}

/// Build the interpreter arguments for a pip install of the staged copy.
///
/// Forwarded arguments come first, then `--editable` unless disabled, then
/// the staged path with any extras re-appended.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use ro_editable::invoker::pip_install_args;
/// use ro_editable::request::PackageRequest;
///
/// let request = PackageRequest::parse("/ro/mypkg[dev]", true, Vec::new())?;
/// let args = pip_install_args(&request, Utf8Path::new("/tmp/xyz/mypkg"));
/// assert_eq!(
///     args,
///     ["-m", "pip", "install", "--editable", "/tmp/xyz/mypkg[dev]"]
/// );
/// # Ok::<(), ro_editable::error::InstallerError>(())
/// ```
#[must_use]
pub fn pip_install_args(request: &PackageRequest, staged_path: &Utf8Path) -> Vec<String> {
    let mut args: Vec<String> = ["-m", "pip", "install"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    args.extend(request.installer_args().iter().cloned());
    if request.editable() {
        args.push("--editable".to_owned());
    }
    args.push(request.install_target(staged_path));
    args
}
