//! Character-at-a-time line editing on top of a raw terminal.
//!
//! The editor only appends to and deletes from the end of its buffer; there
//! is no cursor movement within the line. Recognised keys:
//!
//! | Key | Effect |
//! |---|---|
//! | Enter (`\n` or `\r`) | finish the line |
//! | Ctrl-D (`0x04`) | end of input on an empty buffer, ignored otherwise |
//! | Ctrl-C (`0x03`) | abandon the line |
//! | Tab | complete the buffer |
//! | Up / Down (`ESC [ A` / `ESC [ B`) | recall history |
//! | Backspace (`0x7f` or `0x08`) | delete the last character |

use crate::completion::{Completer, Completion};
use crate::history::History;
use std::io::{self, Read, Write};

const INTERRUPT: u8 = 0x03;
const END_OF_TRANSMISSION: u8 = 0x04;
const BACKSPACE: u8 = 0x08;
const TAB: u8 = b'\t';
const NEWLINE: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';
const ESCAPE: u8 = 0x1b;
const DELETE: u8 = 0x7f;

const BELL: &str = "\x07";
const ERASE_CHAR: &str = "\x08 \x08";
const ERASE_LINE: &str = "\r\x1b[2K";

/// How reading one line ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C: nothing to run, show a fresh prompt.
    Interrupted,
    /// Ctrl-D on an empty line, or the input stream closed.
    EndOfInput,
}

/// Reads lines from `input`, echoing edits to `output`.
pub struct LineEditor<R, W> {
    input: R,
    output: W,
    completer: Completer,
    prompt: String,
}

/// Per-line editing state.
#[derive(Default)]
struct LineState {
    buffer: String,
    /// Bytes of a multi-byte UTF-8 character received so far.
    pending: Vec<u8>,
    bell_rang: bool,
}

impl<R: Read, W: Write> LineEditor<R, W> {
    pub fn new(input: R, output: W, completer: Completer, prompt: impl Into<String>) -> Self {
        Self {
            input,
            output,
            completer,
            prompt: prompt.into(),
        }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Shows the prompt and edits one line until Enter, Ctrl-C or Ctrl-D.
    ///
    /// Navigation through `history` starts from the fresh line each time.
    pub fn read_line(&mut self, history: &mut History) -> io::Result<ReadOutcome> {
        history.reset_cursor();
        let mut state = LineState::default();

        self.write(&self.prompt.clone())?;

        loop {
            let Some(byte) = self.read_byte()? else {
                self.write("\n")?;
                // a final unterminated line still runs; the next call reports the end
                if state.buffer.is_empty() {
                    return Ok(ReadOutcome::EndOfInput);
                }
                return Ok(ReadOutcome::Line(state.buffer));
            };

            match byte {
                END_OF_TRANSMISSION => {
                    if state.buffer.is_empty() {
                        self.write("\n")?;
                        return Ok(ReadOutcome::EndOfInput);
                    }
                }
                INTERRUPT => {
                    self.write("\n")?;
                    return Ok(ReadOutcome::Interrupted);
                }
                NEWLINE | CARRIAGE_RETURN => {
                    self.write("\n")?;
                    return Ok(ReadOutcome::Line(state.buffer));
                }
                TAB => self.complete(&mut state)?,
                ESCAPE => self.escape_sequence(&mut state, history)?,
                DELETE | BACKSPACE => {
                    state.pending.clear();
                    if state.buffer.pop().is_some() {
                        self.write(ERASE_CHAR)?;
                    }
                    state.bell_rang = false;
                }
                other => self.insert(&mut state, other)?,
            }
        }
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    fn insert(&mut self, state: &mut LineState, byte: u8) -> io::Result<()> {
        state.pending.push(byte);
        match std::str::from_utf8(&state.pending) {
            Ok(text) => {
                let text = text.to_string();
                state.pending.clear();
                state.buffer.push_str(&text);
                state.bell_rang = false;
                self.write(&text)
            }
            // wait for the rest of the character
            Err(e) if e.error_len().is_none() => Ok(()),
            Err(_) => {
                state.pending.clear();
                Ok(())
            }
        }
    }

    fn complete(&mut self, state: &mut LineState) -> io::Result<()> {
        match self.completer.complete(&state.buffer, state.bell_rang) {
            Completion::Insert(text) => {
                state.buffer.push_str(&text);
                self.write(&text)
            }
            Completion::Bell => {
                state.bell_rang = true;
                self.write(BELL)
            }
            Completion::Listing(candidates) => {
                let listing = format!("\n{}\n{}{}", candidates.join("  "), self.prompt, state.buffer);
                self.write(&listing)?;
                state.bell_rang = true;
                self.write(BELL)
            }
        }
    }

    /// Handles the two bytes after ESC. Only `[A` and `[B` do anything.
    fn escape_sequence(&mut self, state: &mut LineState, history: &mut History) -> io::Result<()> {
        let Some(bracket) = self.read_byte()? else {
            return Ok(());
        };
        let Some(direction) = self.read_byte()? else {
            return Ok(());
        };
        if bracket != b'[' {
            return Ok(());
        }

        let recalled = match direction {
            b'A' => history.recall_previous(),
            b'B' => history.recall_next(),
            _ => None,
        };

        if let Some(line) = recalled {
            state.buffer = line.to_string();
            state.pending.clear();
            state.bell_rang = false;
            let redraw = format!("{ERASE_LINE}{}{}", self.prompt, state.buffer);
            self.write(&redraw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const UP: &str = "\x1b[A";
    const DOWN: &str = "\x1b[B";

    fn editor(input: &str, builtins: &[&str]) -> LineEditor<Cursor<Vec<u8>>, Vec<u8>> {
        LineEditor::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            Completer::new(builtins.iter().copied(), None),
            "$ ",
        )
    }

    fn read(input: &str, history: &mut History) -> (ReadOutcome, String) {
        let mut editor = editor(input, &["exit", "echo", "pwd"]);
        let outcome = editor.read_line(history).unwrap();
        let output = String::from_utf8(editor.output().clone()).unwrap();
        (outcome, output)
    }

    #[test]
    fn test_plain_line_is_echoed() {
        let (outcome, output) = read("ls -l\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("ls -l".to_string()));
        assert_eq!(output, "$ ls -l\n");
    }

    #[test]
    fn test_carriage_return_finishes_line() {
        let (outcome, _) = read("pwd\r", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("pwd".to_string()));
    }

    #[test]
    fn test_backspace_erases_last_char() {
        let (outcome, output) = read("lss\x7f\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("ls".to_string()));
        assert_eq!(output, "$ lss\x08 \x08\n");
    }

    #[test]
    fn test_backspace_on_empty_buffer_is_noop() {
        let (outcome, output) = read("\x7f\x7fa\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("a".to_string()));
        assert_eq!(output, "$ a\n");
    }

    #[test]
    fn test_ctrl_d() {
        let (outcome, _) = read("\x04", &mut History::new());
        assert_eq!(outcome, ReadOutcome::EndOfInput);

        // ignored while the buffer has text
        let (outcome, _) = read("ab\x04c\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("abc".to_string()));
    }

    #[test]
    fn test_closed_input_is_end_of_input() {
        let (outcome, _) = read("", &mut History::new());
        assert_eq!(outcome, ReadOutcome::EndOfInput);

        let mut editor = editor("partial", &[]);
        let mut history = History::new();
        assert_eq!(
            editor.read_line(&mut history).unwrap(),
            ReadOutcome::Line("partial".to_string())
        );
        assert_eq!(editor.read_line(&mut history).unwrap(), ReadOutcome::EndOfInput);
    }

    #[test]
    fn test_ctrl_c_abandons_line() {
        let (outcome, output) = read("echo hi\x03", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Interrupted);
        assert_eq!(output, "$ echo hi\n");
    }

    #[test]
    fn test_tab_completes_single_candidate() {
        let (outcome, output) = read("ex\t\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("exit ".to_string()));
        assert_eq!(output, "$ exit \n");
    }

    #[test]
    fn test_double_tab_lists_candidates() {
        let (outcome, output) = read("e\t\t\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("e".to_string()));
        assert_eq!(output, "$ e\x07\necho  exit\n$ e\x07\n");
    }

    #[test]
    fn test_edit_between_tabs_resets_bell() {
        let mut editor = editor("e\tc\x7f\t\n", &["exit", "echo"]);
        let outcome = editor.read_line(&mut History::new()).unwrap();
        let output = String::from_utf8(editor.output().clone()).unwrap();
        assert_eq!(outcome, ReadOutcome::Line("e".to_string()));
        // second Tab only rings again, no listing
        assert_eq!(output, "$ e\x07c\x08 \x08\x07\n");
    }

    #[test]
    fn test_history_up_and_down() {
        let mut history = History::new();
        history.add_line("ls");
        history.add_line("pwd");

        let (outcome, _) = read(&format!("{UP}\n"), &mut history);
        assert_eq!(outcome, ReadOutcome::Line("pwd".to_string()));

        let (outcome, _) = read(&format!("{UP}{UP}{UP}\n"), &mut history);
        assert_eq!(outcome, ReadOutcome::Line("ls".to_string()));

        let (outcome, output) = read(&format!("{UP}{DOWN}\n"), &mut history);
        assert_eq!(outcome, ReadOutcome::Line(String::new()));
        assert_eq!(output, "$ \r\x1b[2K$ pwd\r\x1b[2K$ \n");
    }

    #[test]
    fn test_other_escape_sequences_are_ignored() {
        let (outcome, output) = read("a\x1b[C\x1b[Db\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("ab".to_string()));
        assert_eq!(output, "$ ab\n");
    }

    #[test]
    fn test_input_after_the_line_is_left_unread() {
        use std::fs::File;
        use std::io::{Seek, SeekFrom};

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"cat\nhello\n").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut editor = LineEditor::new(&file, Vec::new(), Completer::new(["exit"], None), "$ ");
        let outcome = editor.read_line(&mut History::new()).unwrap();
        assert_eq!(outcome, ReadOutcome::Line("cat".to_string()));

        // whatever runs next still finds its input on the descriptor
        let mut reader: &File = &file;
        assert_eq!(reader.stream_position().unwrap(), 4);
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "hello\n");
    }

    #[test]
    fn test_multibyte_characters() {
        let (outcome, output) = read("echo héllo\x7f\x7fo\n", &mut History::new());
        assert_eq!(outcome, ReadOutcome::Line("echo hélo".to_string()));
        assert_eq!(output, "$ echo héllo\x08 \x08\x08 \x08o\n");
    }
}
