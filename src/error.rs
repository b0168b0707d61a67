//! Error types surfaced by the shell's execution layer.

use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the read-eval loop reports to the user before continuing.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A redirect target could not be opened for writing.
    #[error("{}: {source}", path.display())]
    RedirectOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The shell could not fork a process for `program`.
    #[error("{program}: cannot spawn process: {source}")]
    Spawn {
        program: String,
        #[source]
        source: Errno,
    },

    /// Arguments are passed to `execv` as C strings.
    #[error("{program}: argument contains a NUL byte")]
    NulByte { program: String },

    #[error("cannot create pipe: {0}")]
    Pipe(#[source] Errno),

    #[error("cannot wait for child process: {0}")]
    Wait(#[source] Errno),

    /// Saving or restoring the terminal mode failed.
    #[error("terminal: {0}")]
    Terminal(#[source] Errno),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
