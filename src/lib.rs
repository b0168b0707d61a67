//! A small interactive POSIX-style shell.
//!
//! A line typed at the prompt is split into pipeline stages by [`parser`],
//! each stage carrying its arguments and output redirects. The
//! [`Interpreter`] runs a lone builtin in-process and everything else in
//! forked children, wiring pipes and redirected files onto descriptors
//! 0, 1 and 2. [`Shell`] ties this to a raw-mode line editor with tab
//! completion and a persistent history.
//!
//! The building blocks are public so they can be driven without a terminal,
//! e.g. [`Interpreter::run_line`] or a [`Shell`] over in-memory streams.

mod builtin;
pub mod command;
mod completion;
mod editor;
pub mod env;
pub mod error;
mod external;
mod history;
mod interpreter;
pub mod io_adapters;
pub mod parser;
pub mod redirect;
mod shell;
mod terminal;

pub use builtin::Builtin;
pub use completion::{Completer, Completion};
pub use editor::{LineEditor, ReadOutcome};
pub use env::Environment;
pub use error::ShellError;
pub use external::which;
pub use history::History;
/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use shell::{Shell, ShellOptions};
pub use terminal::ignore_interrupts;
