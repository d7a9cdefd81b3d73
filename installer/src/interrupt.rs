//! SIGINT and SIGTERM handling.
//!
//! The staging directory is removed when its guard is dropped, which never
//! happens if a signal kills the process outright. The handler installed here
//! only records the signal. Long-running steps poll [`is_interrupted`] and
//! unwind through the ordinary error path, dropping the guard on the way out.

use crate::error::{InstallerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the recording handler for SIGINT and SIGTERM.
///
/// Caught signals are reset to their default action across `exec`, so pip
/// and the site probe still terminate on a terminal interrupt.
///
/// # Errors
///
/// Returns an I/O error if a handler cannot be installed.
#[cfg(unix)]
pub fn install_handler() -> Result<()> {
    let handler: extern "C" fn(libc::c_int) = record_signal;
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: `record_signal` only stores to an atomic, which is
        // async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    Ok(())
}

/// Install the recording handler for SIGINT and SIGTERM.
///
/// Console control events are not intercepted on this platform.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub const fn install_handler() -> Result<()> {
    Ok(())
}

#[cfg(unix)]
extern "C" fn record_signal(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Returns true once SIGINT or SIGTERM has been received.
#[must_use]
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Fail with [`InstallerError::Interrupted`] if a signal has been received.
///
/// # Errors
///
/// Returns [`InstallerError::Interrupted`] after SIGINT or SIGTERM.
pub fn check() -> Result<()> {
    if is_interrupted() {
        return Err(InstallerError::Interrupted);
    }
    Ok(())
}
