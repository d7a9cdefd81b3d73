//! Runtime configuration taken from the environment.
//!
//! Command-line flags are reserved for pip: anything `ro-editable` does not
//! recognise is forwarded to it, so tool-level settings that could collide
//! with pip options (such as pip's own `--python`) come from environment
//! variables instead.

use std::ffi::OsString;

/// Environment variable naming the Python interpreter to run pip with.
pub const PYTHON_ENV: &str = "RO_EDITABLE_PYTHON";

/// Interpreter used when [`PYTHON_ENV`] is unset or empty.
#[cfg(windows)]
pub const DEFAULT_PYTHON: &str = "python";

/// Interpreter used when [`PYTHON_ENV`] is unset or empty.
#[cfg(not(windows))]
pub const DEFAULT_PYTHON: &str = "python3";

/// Settings for one run of the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Interpreter used for both `pip install` and the site probe.
    pub python: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            python: DEFAULT_PYTHON.to_owned(),
        }
    }
}

impl RunConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Examples
    ///
    /// ```
    /// use ro_editable::config::RunConfig;
    ///
    /// let config = RunConfig::from_env();
    /// assert!(!config.python.is_empty());
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Build the configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let python = lookup(PYTHON_ENV)
            .and_then(|value| value.into_string().ok())
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PYTHON.to_owned());
        Self { python }
    }
}
