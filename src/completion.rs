//! Tab completion of command names.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// What the editor should do in response to a Tab press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Text to append to the buffer.
    Insert(String),
    /// Nothing to add; ring the bell.
    Bell,
    /// Ambiguous on a repeated Tab: full candidate names, sorted. The bell
    /// still rings after they are shown.
    Listing(Vec<String>),
}

/// Completes a prefix against builtin names and the executables on PATH.
///
/// PATH is scanned on every call; nothing is cached.
#[derive(Debug, Clone)]
pub struct Completer {
    builtins: Vec<String>,
    search_path: Option<OsString>,
}

impl Completer {
    pub fn new<S: Into<String>>(
        builtins: impl IntoIterator<Item = S>,
        search_path: Option<&str>,
    ) -> Self {
        Self {
            builtins: builtins.into_iter().map(Into::into).collect(),
            search_path: search_path.map(OsString::from),
        }
    }

    /// Decide how to complete `prefix`. `bell_rang` is true when the previous
    /// Tab on this same buffer already produced no progress.
    pub fn complete(&self, prefix: &str, bell_rang: bool) -> Completion {
        let suffixes = self.suffixes(prefix);

        match suffixes.len() {
            0 => Completion::Bell,
            1 => {
                let only = suffixes.into_iter().next().unwrap_or_default();
                Completion::Insert(format!("{only} "))
            }
            _ => {
                let suffixes: Vec<String> = suffixes.into_iter().collect();
                if let Some(shared) = shared_prefix(&suffixes) {
                    Completion::Insert(shared)
                } else if bell_rang {
                    Completion::Listing(
                        suffixes
                            .iter()
                            .map(|suffix| format!("{prefix}{suffix}"))
                            .collect(),
                    )
                } else {
                    Completion::Bell
                }
            }
        }
    }

    /// Distinct remainders of every candidate starting with `prefix`.
    fn suffixes(&self, prefix: &str) -> BTreeSet<String> {
        let mut suffixes: BTreeSet<String> = self
            .builtins
            .iter()
            .filter_map(|name| name.strip_prefix(prefix))
            .map(str::to_string)
            .collect();

        if let Some(search_path) = &self.search_path {
            for dir in std::env::split_paths(search_path) {
                let Ok(entries) = fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let Ok(file_name) = entry.file_name().into_string() else {
                        continue;
                    };
                    let Some(suffix) = file_name.strip_prefix(prefix) else {
                        continue;
                    };
                    if is_executable(&entry.path()) {
                        suffixes.insert(suffix.to_string());
                    }
                }
            }
        }

        suffixes
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Longest non-empty string every candidate starts with.
///
/// Candidates are compared shortest first, ties broken alphabetically.
fn shared_prefix(candidates: &[String]) -> Option<String> {
    let mut sorted: Vec<&str> = candidates.iter().map(String::as_str).collect();
    sorted.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let (first, others) = sorted.split_first()?;
    let mut end = 0;
    for (index, ch) in first.char_indices() {
        let next = index + ch.len_utf8();
        if others.iter().all(|other| other.starts_with(&first[..next])) {
            end = next;
        } else {
            break;
        }
    }

    if end == 0 {
        None
    } else {
        Some(first[..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn builtins_only(names: &[&str]) -> Completer {
        Completer::new(names.iter().copied(), None)
    }

    #[cfg(unix)]
    fn make_executable(dir: &Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_single_candidate_gets_trailing_space() {
        let completer = builtins_only(&["exit", "echo", "pwd"]);
        assert_eq!(
            completer.complete("ex", false),
            Completion::Insert("it ".to_string())
        );
    }

    #[test]
    fn test_no_candidates_rings_bell() {
        let completer = builtins_only(&["exit", "echo", "pwd"]);
        assert_eq!(completer.complete("zzz", false), Completion::Bell);
        assert_eq!(completer.complete("zzz", true), Completion::Bell);
    }

    #[test]
    fn test_ambiguous_prefix_bell_then_listing() {
        let completer = builtins_only(&["exit", "echo", "pwd"]);
        assert_eq!(completer.complete("", false), Completion::Bell);
        assert_eq!(
            completer.complete("", true),
            Completion::Listing(vec![
                "echo".to_string(),
                "exit".to_string(),
                "pwd".to_string()
            ])
        );
    }

    #[test]
    fn test_shared_prefix_partial_completion() {
        let completer = builtins_only(&["xyz_foo", "xyz_foo_bar", "xyz_foo_bar_baz"]);
        assert_eq!(
            completer.complete("xy", false),
            Completion::Insert("z_foo".to_string())
        );
    }

    #[test]
    fn test_exact_match_among_longer_names_is_ambiguous() {
        let completer = builtins_only(&["xyz_foo", "xyz_foo_bar"]);
        assert_eq!(completer.complete("xyz_foo", false), Completion::Bell);
        assert_eq!(
            completer.complete("xyz_foo", true),
            Completion::Listing(vec!["xyz_foo".to_string(), "xyz_foo_bar".to_string()])
        );
    }

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shared_prefix_helper() {
        assert_eq!(shared_prefix(&candidates(&["abc", "abd"])), Some("ab".to_string()));
        assert_eq!(shared_prefix(&candidates(&["a", "b"])), None);
        assert_eq!(shared_prefix(&candidates(&["", "x"])), None);
        assert_eq!(shared_prefix(&candidates(&[])), None);
    }

    #[test]
    #[cfg(unix)]
    fn test_path_executables_are_candidates() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(dir.path(), "custom_tool_one");
        make_executable(dir.path(), "custom_tool_two");
        // not executable: ignored
        File::create(dir.path().join("custom_tool_notes")).unwrap();

        let search = dir.path().display().to_string();
        let completer = Completer::new(["echo"], Some(search.as_str()));

        assert_eq!(
            completer.complete("custom_", false),
            Completion::Insert("tool_".to_string())
        );
        assert_eq!(
            completer.complete("custom_tool_o", false),
            Completion::Insert("ne ".to_string())
        );
        assert_eq!(
            completer.complete("custom_tool_", true),
            Completion::Listing(vec![
                "custom_tool_one".to_string(),
                "custom_tool_two".to_string()
            ])
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_builtin_and_executable_with_same_name_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(dir.path(), "echo");

        let search = dir.path().display().to_string();
        let completer = Completer::new(["echo", "exit"], Some(search.as_str()));
        assert_eq!(
            completer.complete("ec", false),
            Completion::Insert("ho ".to_string())
        );
    }
}
