//! `ro-editable` CLI entrypoint.
//!
//! Installs a package in editable mode from a read-only source tree, then
//! reports the outcome on stderr.

use ro_editable::cli::Cli;
use ro_editable::config::RunConfig;
use ro_editable::error::{InstallerError, Result};
use ro_editable::interrupt;
use ro_editable::invoker::SystemCommandExecutor;
use ro_editable::output::write_stderr_line;
use ro_editable::pipeline::{InstallContext, run_install};
use ro_editable::site::PythonSiteLocator;
use ro_editable::stager::Stager;
use std::io::Write;

fn main() {
    let cli = Cli::parse_with_forwarding();
    let config = RunConfig::from_env();
    let mut stderr = std::io::stderr();
    let run_result = interrupt::install_handler().and_then(|()| run(cli, &config, &mut stderr));
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Exit status after SIGINT or SIGTERM, following the shell convention.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn run(cli: Cli, config: &RunConfig, stderr: &mut dyn Write) -> Result<()> {
    let request = cli.into_request()?;

    let executor = SystemCommandExecutor;
    let site_locator = PythonSiteLocator::new(&executor, &config.python);
    let stager = Stager::new();
    let context = InstallContext {
        executor: &executor,
        site_locator: &site_locator,
        stager: &stager,
        python: &config.python,
    };

    run_install(&context, &request, stderr)?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err @ InstallerError::Interrupted) => {
            write_stderr_line(stderr, format!("error: {err}"));
            INTERRUPTED_EXIT_CODE
        }
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
