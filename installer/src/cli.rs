//! CLI argument definitions for `ro-editable`.
//!
//! Only the package path and `--no-editable` belong to this tool; every other
//! argument is forwarded verbatim to `pip install`. clap cannot leave unknown
//! options alone, so [`split_forwarded_args`] partitions argv first and clap
//! only ever sees the tool's own arguments.

use crate::error::Result;
use crate::request::PackageRequest;
use clap::Parser;
use std::ffi::OsString;

/// Editable pip install for packages on read-only filesystems.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "ro-editable")]
#[command(version, about)]
#[command(long_about = concat!(
    "Editable pip install for packages on read-only filesystems.\n\n",
    "pip cannot install a package in editable mode when its source tree is ",
    "not writable. ro-editable copies the package to a temporary directory, ",
    "runs `pip install --editable` against the copy, then rewrites every ",
    "link pip created so it points back at the original directory.\n\n",
    "Any argument not listed below is passed through to `pip install`.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  RO_EDITABLE_PYTHON    Python interpreter to run pip with [default: python3]\n\n",
    "EXAMPLES:\n",
    "  Install a mounted package in editable mode:\n",
    "    $ ro-editable /src/mypkg\n\n",
    "  Install with extras into the user site:\n",
    "    $ ro-editable '/src/mypkg[dev,test]' --user\n\n",
    "  Install a regular copy instead:\n",
    "    $ ro-editable --no-editable /src/mypkg",
))]
pub struct Cli {
    /// Install a regular copy instead of an editable one.
    #[arg(long)]
    pub no_editable: bool,

    /// Package directory, optionally with an extras suffix such as `pkg[dev]`.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Arguments forwarded to `pip install`, in their original order.
    #[arg(skip)]
    pub pip_args: Vec<String>,
}

/// Options this tool handles itself.
const OWN_FLAGS: &[&str] = &["--no-editable", "-h", "--help", "-V", "--version"];

/// pip install options whose value is a separate argument.
///
/// When one of these is forwarded, the following argument is forwarded with
/// it rather than being mistaken for the package path.
pub const PIP_VALUE_OPTIONS: &[&str] = &[
    "-r",
    "--requirement",
    "-c",
    "--constraint",
    "-t",
    "--target",
    "-i",
    "--index-url",
    "--extra-index-url",
    "-f",
    "--find-links",
    "--prefix",
    "--root",
    "--src",
    "--upgrade-strategy",
    "-C",
    "--config-settings",
    "--global-option",
    "--platform",
    "--python-version",
    "--implementation",
    "--abi",
    "--progress-bar",
    "--root-user-action",
    "--report",
    "--log",
    "--proxy",
    "--retries",
    "--timeout",
    "--exists-action",
    "--trusted-host",
    "--cert",
    "--client-cert",
    "--cache-dir",
    "--no-binary",
    "--only-binary",
    "--python",
    "--use-feature",
    "--use-deprecated",
    "--keyring-provider",
    "--group",
];

/// Partition argv into this tool's arguments and pip's.
///
/// The first element (the program name) is always kept. The first bare
/// argument is the package path; every option not in the tool's own set is
/// forwarded, together with its value when it is a known pip value option.
/// Everything after a literal `--` is forwarded.
///
/// # Examples
///
/// ```
/// use ro_editable::cli::split_forwarded_args;
///
/// let argv = ["ro-editable", "--user", "-i", "https://mirror/simple", "/ro/pkg", "--no-editable"]
///     .map(String::from)
///     .to_vec();
/// let (own, forwarded) = split_forwarded_args(argv);
/// assert_eq!(own, ["ro-editable", "/ro/pkg", "--no-editable"]);
/// assert_eq!(forwarded, ["--user", "-i", "https://mirror/simple"]);
/// ```
#[must_use]
pub fn split_forwarded_args(args: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut own = Vec::new();
    let mut forwarded = Vec::new();
    let mut path_seen = false;
    let mut iter = args.into_iter();

    own.extend(iter.next());

    while let Some(arg) = iter.next() {
        if arg == "--" {
            forwarded.extend(iter.by_ref());
            break;
        }
        if OWN_FLAGS.contains(&arg.as_str()) {
            own.push(arg);
        } else if arg.starts_with('-') && arg.len() > 1 {
            let takes_value = PIP_VALUE_OPTIONS.contains(&arg.as_str());
            forwarded.push(arg);
            if takes_value {
                forwarded.extend(iter.next());
            }
        } else if path_seen {
            forwarded.push(arg);
        } else {
            path_seen = true;
            own.push(arg);
        }
    }

    (own, forwarded)
}

impl Cli {
    /// Parse the process arguments, exiting with usage on error.
    #[must_use]
    pub fn parse_with_forwarding() -> Self {
        match Self::try_parse_with_forwarding(std::env::args_os()) {
            Ok(cli) => cli,
            Err(err) => err.exit(),
        }
    }

    /// Parse arguments, forwarding everything unrecognised to pip.
    ///
    /// # Errors
    ///
    /// Returns a clap error for a missing path, an argument that is not
    /// valid UTF-8, or a help/version request.
    pub fn try_parse_with_forwarding<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = args
            .into_iter()
            .map(|arg| {
                arg.into().into_string().map_err(|raw| {
                    clap::Error::raw(
                        clap::error::ErrorKind::InvalidUtf8,
                        format!("argument is not valid UTF-8: {}\n", raw.to_string_lossy()),
                    )
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let (own, forwarded) = split_forwarded_args(args);
        let mut cli = Self::try_parse_from(own)?;
        cli.pip_args = forwarded;
        Ok(cli)
    }

    /// Build the install request described by these arguments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InstallerError::InvalidPackagePath`] if the
    /// path cannot be interpreted.
    pub fn into_request(self) -> Result<PackageRequest> {
        PackageRequest::parse(&self.path, !self.no_editable, self.pip_args)
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
