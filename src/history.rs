//! In-memory command history with arrow-key navigation and a one-line-per-record
//! file format for persistence.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Append-only log of accepted input lines.
///
/// The navigation cursor ranges over `0..=len`; `len` means the user is
/// editing a fresh line rather than recalling an old one.
#[derive(Debug, Default, Clone)]
pub struct History {
    lines: Vec<String>,
    cursor: usize,
    /// Number of leading lines already present in the history file.
    persisted: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line. Blank lines are not recorded. Resets navigation.
    pub fn add_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !line.trim().is_empty() {
            self.lines.push(line);
        }
        self.reset_cursor();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines with their 1-based index, oldest first.
    ///
    /// `start` selects how many of the most recent lines to produce; `0` (or a
    /// value past the length) produces the whole log. Every call returns a
    /// fresh iterator.
    pub fn iterate(&self, start: usize) -> impl Iterator<Item = (usize, &str)> + '_ {
        let skip = if start == 0 {
            0
        } else {
            self.lines.len().saturating_sub(start)
        };

        self.lines
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, line)| (index + 1, line.as_str()))
    }

    /// Go back to "editing a fresh line".
    pub fn reset_cursor(&mut self) {
        self.cursor = self.lines.len();
    }

    /// Moves one entry back. `None` when already at the oldest entry.
    pub fn recall_previous(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.lines.get(self.cursor).map(String::as_str)
    }

    /// Moves one entry forward. Stepping past the newest entry yields an empty
    /// line; `None` when not recalling at all.
    pub fn recall_next(&mut self) -> Option<&str> {
        if self.cursor >= self.lines.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.lines.get(self.cursor).map_or("", String::as_str))
    }

    /// Appends every non-empty line of the file at `path`.
    ///
    /// A missing file is treated as empty. Lines typed earlier in the session
    /// still count as unsaved for [`History::append_to`].
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };

        for line in contents.lines() {
            self.add_line(line);
        }
        Ok(())
    }

    /// Startup load: like [`History::load`], and everything held afterwards
    /// is considered already written to the history file.
    pub fn load_initial(&mut self, path: &Path) -> io::Result<()> {
        self.load(path)?;
        self.persisted = self.lines.len();
        Ok(())
    }

    /// Writes the whole log to `path`, replacing its contents.
    pub fn save(&mut self, path: &Path) -> io::Result<()> {
        self.write_from(path, 0, false)
    }

    /// Appends the lines added since the last load or save to `path`.
    pub fn append_to(&mut self, path: &Path) -> io::Result<()> {
        self.write_from(path, self.persisted, true)
    }

    fn write_from(&mut self, path: &Path, from: usize, append: bool) -> io::Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        for line in &self.lines[from.min(self.lines.len())..] {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;

        self.persisted = self.lines.len();
        Ok(())
    }
}
