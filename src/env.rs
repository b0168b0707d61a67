use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Variable that lists the directories searched for executables.
pub const PATH_VAR: &str = "PATH";
/// Variable consulted by `cd` for `~`-prefixed paths.
pub const HOME_VAR: &str = "HOME";
/// Variable naming the history file loaded at startup and saved on exit.
pub const HISTFILE_VAR: &str = "HISTFILE";

/// Snapshot of the variables the shell consults.
///
/// The map is captured once at startup. Lookups never fall back to the live
/// process environment, so tests can hand the shell a controlled set of
/// variables without touching global state.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn new() -> Self {
        Self::from_vars(stdenv::vars())
    }

    /// Build an environment from an explicit list of variables.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override an environment variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The executable search path, if set and non-empty.
    pub fn search_path(&self) -> Option<&str> {
        self.get_var(PATH_VAR).filter(|paths| !paths.is_empty())
    }

    pub fn home(&self) -> Option<PathBuf> {
        self.get_var(HOME_VAR)
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }

    pub fn history_file(&self) -> Option<PathBuf> {
        self.get_var(HISTFILE_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }
}
