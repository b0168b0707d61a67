use crate::builtin::Builtin;
use crate::command::{ExitCode, Flow};
use crate::completion::Completer;
use crate::editor::{LineEditor, ReadOutcome};
use crate::env::Environment;
use crate::history::History;
use crate::interpreter::Interpreter;
use crate::terminal::RawMode;
use anyhow::Result;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Settings chosen at startup.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub prompt: String,
    /// Where history is loaded from and saved to. Falls back to `$HISTFILE`.
    pub history_file: Option<PathBuf>,
    /// Put the terminal in raw mode around each read.
    pub interactive: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            history_file: None,
            interactive: false,
        }
    }
}

/// The read-eval loop: edits a line, records it, runs it, repeats until
/// `exit` or end of input.
pub struct Shell<R, W> {
    interpreter: Interpreter,
    history: History,
    editor: LineEditor<R, W>,
    history_file: Option<PathBuf>,
    interactive: bool,
}

impl Shell<File, io::Stdout> {
    /// A shell reading keystrokes from stdin and echoing to stdout.
    ///
    /// Input is read from a duplicate of descriptor 0 rather than through
    /// `io::Stdin`, whose buffer would swallow bytes meant for the commands
    /// the shell starts.
    pub fn stdio(env: Environment, options: ShellOptions) -> io::Result<Self> {
        let input = File::from(io::stdin().as_fd().try_clone_to_owned()?);
        Ok(Self::new(input, io::stdout(), env, options))
    }
}

impl<R: Read, W: Write> Shell<R, W> {
    pub fn new(input: R, output: W, env: Environment, options: ShellOptions) -> Self {
        let completer = Completer::new(Builtin::names(), env.search_path());
        let history_file = options.history_file.or_else(|| env.history_file());

        Self {
            interpreter: Interpreter::new(env),
            history: History::new(),
            editor: LineEditor::new(input, output, completer, options.prompt),
            history_file,
            interactive: options.interactive,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Runs until `exit` or end of input and returns the shell's exit status.
    ///
    /// History is loaded before the first prompt and written back afterwards,
    /// even when the loop stops on an error.
    pub fn run(&mut self) -> Result<ExitCode> {
        self.load_history();
        let result = self.repl();
        self.save_history();
        result
    }

    fn repl(&mut self) -> Result<ExitCode> {
        loop {
            let outcome = {
                let _raw = if self.interactive {
                    RawMode::enable()?
                } else {
                    None
                };
                self.editor.read_line(&mut self.history)?
            };

            let line = match outcome {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => continue,
                ReadOutcome::EndOfInput => return Ok(0),
            };

            self.history.add_line(line.as_str());
            match self.interpreter.run_line(&line, &mut self.history) {
                Ok(Flow::Exit(code)) => return Ok(code),
                Ok(Flow::Continue(status)) => debug!(status, "line finished"),
                Err(err) => {
                    debug!(error = ?err, "line failed");
                    eprintln!("minish: {err}");
                }
            }
        }
    }

    fn load_history(&mut self) {
        let Some(path) = &self.history_file else {
            return;
        };
        match self.history.load_initial(path) {
            Ok(()) => debug!(path = %path.display(), entries = self.history.len(), "history loaded"),
            Err(err) => warn!(path = %path.display(), %err, "failed to load history"),
        }
    }

    fn save_history(&mut self) {
        let Some(path) = &self.history_file else {
            return;
        };
        if let Err(err) = self.history.save(path) {
            warn!(path = %path.display(), %err, "failed to save history");
        }
    }
}
