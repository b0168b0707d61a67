use crate::command::{Redirect, StreamTarget};
use crate::error::ShellError;
use crate::io_adapters::Sink;
use nix::unistd::dup2;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use tracing::debug;

/// Files opened for one command's redirects.
///
/// A missing stream means "inherit the shell's own". Dropping the value
/// closes whatever was opened.
#[derive(Debug, Default)]
pub struct RedirectStreams {
    output: Option<File>,
    error: Option<File>,
}

impl RedirectStreams {
    /// Opens every redirect in order. The last redirect for a stream wins;
    /// an earlier file for that stream is closed as soon as it is replaced.
    /// Redirects of unknown descriptors are opened and closed right away.
    pub fn open(redirects: &[Redirect]) -> Result<Self, ShellError> {
        let mut streams = RedirectStreams::default();

        for redirect in redirects {
            let file = open_redirect(redirect)?;
            debug!(path = %redirect.path.display(), target = ?redirect.target, append = redirect.append, "opened redirect");

            match redirect.target {
                StreamTarget::Output => streams.output = Some(file),
                StreamTarget::Error => streams.error = Some(file),
                StreamTarget::Unknown(_) => drop(file),
            }
        }

        Ok(streams)
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Sink for standard output: the redirect file or the shell's stdout.
    pub fn output(&self) -> Sink<'_> {
        self.output.as_ref().map_or_else(Sink::stdout, Sink::File)
    }

    /// Sink for standard error: the redirect file or the shell's stderr.
    pub fn error(&self) -> Sink<'_> {
        self.error.as_ref().map_or_else(Sink::stderr, Sink::File)
    }

    /// Duplicates the opened files onto descriptors 1 and 2.
    ///
    /// Only meant for a forked child; the originals should be dropped
    /// afterwards so nothing but 0/1/2 reaches the new program image.
    pub fn install(&self) -> nix::Result<()> {
        if let Some(output) = &self.output {
            dup2(output.as_raw_fd(), 1)?;
        }
        if let Some(error) = &self.error {
            dup2(error.as_raw_fd(), 2)?;
        }
        Ok(())
    }
}

fn open_redirect(redirect: &Redirect) -> Result<File, ShellError> {
    let mut options = OpenOptions::new();
    if redirect.append {
        options.append(true).create(true);
    } else {
        options.write(true).create(true).truncate(true);
    }

    options
        .open(&redirect.path)
        .map_err(|source| ShellError::RedirectOpen {
            path: redirect.path.clone(),
            source,
        })
}
