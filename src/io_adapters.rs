use std::fs::File;
use std::io::{self, Result as IoResult, Write};

/// Destination a builtin writes to: either one of the shell's own standard
/// streams or a file opened for a redirect.
pub enum Sink<'a> {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(&'a File),
}

impl Sink<'_> {
    /// The shell's standard output.
    pub fn stdout() -> Self {
        Sink::Stdout(io::stdout())
    }

    /// The shell's standard error.
    pub fn stderr() -> Self {
        Sink::Stderr(io::stderr())
    }
}

impl Write for Sink<'_> {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        match self {
            Sink::Stdout(out) => out.write(data),
            Sink::Stderr(err) => err.write(data),
            Sink::File(file) => file.write(data),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            Sink::Stdout(out) => out.flush(),
            Sink::Stderr(err) => err.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}
