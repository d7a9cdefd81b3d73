//! Shared test doubles for the `ro-editable` crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration suites under `tests/`.

use crate::error::{InstallerError, Result};
use crate::invoker::CommandExecutor;
use crate::site::{SiteLocator, SiteProbe};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "python3").
    pub program: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Replays expected invocations in order and returns their predefined
/// results. Mismatches are reported as [`InstallerError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Returns true when every expected invocation has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.expected.borrow().is_empty()
    }

    fn next_call(&self, program: &str, args: &[String]) -> Result<Output> {
        let call = self.expected.borrow_mut().pop_front().ok_or_else(|| {
            InstallerError::StubMismatch {
                message: format!("unexpected invocation of {program}"),
            }
        })?;

        if call.program != program || call.args != args {
            return Err(InstallerError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {program} {args:?}",
                    call.program, call.args
                ),
            });
        }
        call.result
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        self.next_call(program, args)
    }

    fn run_streamed(&self, program: &str, args: &[String]) -> Result<ExitStatus> {
        self.next_call(program, args).map(|output| output.status)
    }
}

/// A fake pip that writes editable-install artifacts into a site directory.
///
/// On each streamed invocation it takes the install target (the last
/// argument), strips any extras qualifier, and writes every configured
/// artifact with `{staged}` replaced by the staged path. Invocations are
/// recorded for later inspection.
#[derive(Debug)]
pub struct FakePipExecutor {
    site_dir: Utf8PathBuf,
    artifacts: Vec<(String, String)>,
    exit_code: i32,
    invocations: RefCell<Vec<(String, Vec<String>)>>,
}

impl FakePipExecutor {
    /// Create a fake pip that succeeds and writes no artifacts.
    #[must_use]
    pub fn new(site_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            site_dir: site_dir.into(),
            artifacts: Vec::new(),
            exit_code: 0,
            invocations: RefCell::new(Vec::new()),
        }
    }

    /// Add an artifact at `relative` whose content is `template`.
    #[must_use]
    pub fn with_artifact(mut self, relative: &str, template: &str) -> Self {
        self.artifacts
            .push((relative.to_owned(), template.to_owned()));
        self
    }

    /// Make pip exit with `code`; artifacts are only written on success.
    #[must_use]
    pub const fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Every recorded invocation as `(program, args)`.
    #[must_use]
    pub fn invocations(&self) -> Vec<(String, Vec<String>)> {
        self.invocations.borrow().clone()
    }

    /// Arguments of the most recent invocation.
    #[must_use]
    pub fn last_args(&self) -> Option<Vec<String>> {
        self.invocations
            .borrow()
            .last()
            .map(|(_, args)| args.clone())
    }

    fn write_artifacts(&self, staged: &Utf8Path) -> Result<()> {
        for (relative, template) in &self.artifacts {
            let path = self.site_dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, template.replace("{staged}", staged.as_str()))?;
        }
        Ok(())
    }
}

impl CommandExecutor for FakePipExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        Err(InstallerError::StubMismatch {
            message: format!("fake pip does not capture output: {program} {args:?}"),
        })
    }

    fn run_streamed(&self, program: &str, args: &[String]) -> Result<ExitStatus> {
        self.invocations
            .borrow_mut()
            .push((program.to_owned(), args.to_vec()));

        if self.exit_code != 0 {
            return Ok(exit_status(self.exit_code));
        }

        let target = args.last().ok_or_else(|| InstallerError::StubMismatch {
            message: "pip invoked without an install target".to_owned(),
        })?;
        let staged = target.split_once('[').map_or(target.as_str(), |(path, _)| path);
        self.write_artifacts(Utf8Path::new(staged))?;
        Ok(exit_status(0))
    }
}

/// A `SiteLocator` returning fixed directories.
#[derive(Debug, Clone, Default)]
pub struct FakeSiteLocator {
    /// Whether pip "decided" on a user install.
    pub user_install: bool,
    /// The user site directory.
    pub user_site: Option<Utf8PathBuf>,
    /// System site directories.
    pub system_sites: Vec<Utf8PathBuf>,
    probes: RefCell<Vec<bool>>,
}

impl FakeSiteLocator {
    /// A locator whose only answer is the single system site `dir`.
    #[must_use]
    pub fn system(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            system_sites: vec![dir.into()],
            ..Self::default()
        }
    }

    /// A locator reporting a user install into `dir`.
    #[must_use]
    pub fn user(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            user_install: true,
            user_site: Some(dir.into()),
            ..Self::default()
        }
    }

    /// A locator reporting several system sites.
    #[must_use]
    pub fn ambiguous(dirs: Vec<Utf8PathBuf>) -> Self {
        Self {
            system_sites: dirs,
            ..Self::default()
        }
    }

    /// The `user_scope_forced` value of every probe, in order.
    #[must_use]
    pub fn probes(&self) -> Vec<bool> {
        self.probes.borrow().clone()
    }
}

impl SiteLocator for FakeSiteLocator {
    fn probe(&self, user_scope_forced: bool) -> Result<SiteProbe> {
        self.probes.borrow_mut().push(user_scope_forced);
        Ok(SiteProbe {
            user_install: self.user_install,
            user_site: self.user_site.clone(),
            system_sites: self.system_sites.clone(),
        })
    }
}
