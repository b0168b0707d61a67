use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Which of the process' standard streams a redirect replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    /// `>` or `1>`.
    Output,
    /// `2>`.
    Error,
    /// Any other descriptor digit. The file is still opened, then ignored.
    Unknown(u8),
}

impl StreamTarget {
    /// Map a descriptor number written before `>` to its stream.
    pub fn from_fd(fd: u8) -> Self {
        match fd {
            1 => StreamTarget::Output,
            2 => StreamTarget::Error,
            other => StreamTarget::Unknown(other),
        }
    }
}

/// A directive routing one stream of a command into a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: StreamTarget,
    pub path: PathBuf,
    /// `>>`: open in append mode instead of truncating.
    pub append: bool,
}

impl Redirect {
    pub fn new(target: StreamTarget, path: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            target,
            path: path.into(),
            append,
        }
    }
}

/// One stage of a parsed line: a program with its arguments and redirects.
///
/// `arguments[0]` is the program name. The parser never produces a command
/// without arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub arguments: Vec<String>,
    pub redirects: Vec<Redirect>,
}

impl Command {
    pub fn new(arguments: Vec<String>, redirects: Vec<Redirect>) -> Self {
        debug_assert!(!arguments.is_empty());
        Self {
            arguments,
            redirects,
        }
    }

    /// Name of the program to run.
    pub fn program(&self) -> &str {
        &self.arguments[0]
    }
}

/// What the read-eval loop should do after a line has been executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input; carries the status of the last stage.
    Continue(ExitCode),
    /// `exit` was requested with the given status.
    Exit(ExitCode),
}

impl Flow {
    pub fn code(self) -> ExitCode {
        match self {
            Flow::Continue(code) | Flow::Exit(code) => code,
        }
    }
}
