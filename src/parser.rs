//! Splitting of a raw input line into pipeline stages.
//!
//! The scanner walks the line once, left to right, with one character of
//! lookahead. It understands single and double quotes, backslash escapes,
//! output/error redirection (`>`, `>>`, `1>`, `2>`, `2>>`) and `|`.

use crate::command::{Command, Redirect, StreamTarget};
use tracing::debug;

const SINGLE_QUOTE: char = '\'';
const DOUBLE_QUOTE: char = '"';
const BACKSLASH: char = '\\';
const GREATER_THAN: char = '>';
const PIPE: char = '|';

fn is_blank(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

struct LineParser {
    input: Vec<char>,
    pos: usize,
    commands: Vec<Command>,
    arguments: Vec<String>,
    redirects: Vec<Redirect>,
}

impl LineParser {
    fn new(line: &str) -> Self {
        LineParser {
            input: line.chars().collect(),
            pos: 0,
            commands: Vec::new(),
            arguments: Vec::new(),
            redirects: Vec::new(),
        }
    }

    fn parse(mut self) -> Vec<Command> {
        loop {
            self.skip_blanks();

            match self.peek_char() {
                None => break,
                Some(PIPE) => {
                    self.read_char();
                    self.finish_command();
                }
                Some(GREATER_THAN) => {
                    self.read_char();
                    self.redirect(StreamTarget::Output);
                }
                Some(ch) if ch.is_ascii_digit() && self.peek_nth(1) == Some(GREATER_THAN) => {
                    self.read_char();
                    self.read_char();
                    // is_ascii_digit guarantees the conversion succeeds
                    let fd = ch.to_digit(10).unwrap_or_default() as u8;
                    self.redirect(StreamTarget::from_fd(fd));
                }
                Some(_) => {
                    if let Some(word) = self.word() {
                        self.arguments.push(word);
                    }
                }
            }
        }

        self.finish_command();
        self.commands
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn skip_blanks(&mut self) {
        while self.peek_char().is_some_and(is_blank) {
            self.pos += 1;
        }
    }

    /// Reads one argument token. Stops before an unquoted blank, `|` or `>`.
    ///
    /// Returns `None` when the token turned out empty (e.g. `''`).
    fn word(&mut self) -> Option<String> {
        let mut builder = String::new();

        while let Some(ch) = self.peek_char() {
            if is_blank(ch) || ch == PIPE || ch == GREATER_THAN {
                break;
            }
            self.read_char();

            match ch {
                SINGLE_QUOTE => self.single_quote(&mut builder),
                DOUBLE_QUOTE => self.double_quote(&mut builder),
                BACKSLASH => {
                    if let Some(escaped) = self.read_char() {
                        builder.push(escaped);
                    }
                }
                other => builder.push(other),
            }
        }

        if builder.is_empty() {
            None
        } else {
            Some(builder)
        }
    }

    fn single_quote(&mut self, builder: &mut String) {
        while let Some(ch) = self.read_char() {
            if ch == SINGLE_QUOTE {
                return;
            }
            builder.push(ch);
        }
    }

    fn double_quote(&mut self, builder: &mut String) {
        while let Some(ch) = self.read_char() {
            match ch {
                DOUBLE_QUOTE => return,
                BACKSLASH => match self.read_char() {
                    Some(escaped @ (DOUBLE_QUOTE | BACKSLASH)) => builder.push(escaped),
                    Some(other) => {
                        builder.push(BACKSLASH);
                        builder.push(other);
                    }
                    None => {}
                },
                other => builder.push(other),
            }
        }
    }

    /// Called right after the `>` (or `N>`) has been consumed.
    fn redirect(&mut self, target: StreamTarget) {
        let append = self.peek_char() == Some(GREATER_THAN);
        if append {
            self.read_char();
        }

        self.skip_blanks();
        let path = match self.peek_char() {
            None | Some(PIPE) | Some(GREATER_THAN) => None,
            Some(_) => self.word(),
        };

        match path {
            Some(path) => self.redirects.push(Redirect::new(target, path, append)),
            None => debug!(?target, "dropping redirect without a destination"),
        }
    }

    fn finish_command(&mut self) {
        let arguments = std::mem::take(&mut self.arguments);
        let redirects = std::mem::take(&mut self.redirects);

        if arguments.is_empty() {
            if !redirects.is_empty() {
                debug!(count = redirects.len(), "dropping redirects of an empty stage");
            }
            return;
        }

        self.commands.push(Command::new(arguments, redirects));
    }
}

/// Parses one input line into the ordered list of pipeline stages.
///
/// Never fails: malformed pieces (an unterminated quote, a redirect with no
/// destination) are resolved leniently. A blank line yields no commands.
pub fn parse(line: &str) -> Vec<Command> {
    let commands = LineParser::new(line).parse();
    debug!(?commands, "parsed line");
    commands
}
