use crate::error::ShellError;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::termios::{
    LocalFlags, SetArg, SpecialCharacterIndices, Termios, tcgetattr, tcsetattr,
};
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use tracing::warn;

/// Keeps standard input in character-at-a-time mode while alive.
///
/// Echo, canonical line buffering and signal generation are turned off, so
/// Ctrl-C and Ctrl-D reach the editor as plain bytes. The previous settings
/// are restored when the guard is dropped, whichever way the read loop ends.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    /// Switches stdin to raw mode. Returns `None` when stdin is not a terminal.
    pub fn enable() -> Result<Option<Self>, ShellError> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }

        let saved = tcgetattr(stdin.as_fd()).map_err(ShellError::Terminal)?;

        let mut raw = saved.clone();
        raw.local_flags
            .remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw).map_err(ShellError::Terminal)?;

        Ok(Some(Self { saved }))
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(errno) = tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.saved) {
            warn!(%errno, "failed to restore terminal mode");
        }
    }
}

/// Makes the shell itself immune to Ctrl-C while a command runs.
pub fn ignore_interrupts() {
    // SAFETY: installs SIG_IGN, no handler code runs.
    if let Err(errno) = unsafe { signal(Signal::SIGINT, SigHandler::SigIgn) } {
        warn!(%errno, "failed to ignore SIGINT");
    }
}

/// Restores default SIGINT and SIGPIPE handling in a forked child before it
/// runs a command.
///
/// The Rust runtime starts with SIGPIPE ignored and that disposition survives
/// `execv`; without the reset an upstream stage gets EPIPE instead of being
/// terminated when its reader exits.
pub fn default_signals() {
    for sig in [Signal::SIGINT, Signal::SIGPIPE] {
        // SAFETY: installs SIG_DFL, no handler code runs.
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
}
