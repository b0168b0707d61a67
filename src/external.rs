use crate::env::Environment;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolve a command name to the file that would be executed.
///
/// Behavior:
/// - Name containing a path separator (`/bin/ls`, `./run`, `bin/tool`): returned
///   as-is if it exists; PATH is not consulted.
/// - Bare name: each non-empty PATH entry is joined with the name and the first
///   existing entry is returned.
/// - Empty name, or PATH unset/empty for a bare name: `None`.
///
/// Only existence is checked. A file that exists but is not executable is
/// still returned; running it then fails in the child.
pub fn which(env: &Environment, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    let path = Path::new(name);
    if path.components().count() > 1 || path.is_absolute() {
        return find_by_path(path).map(Path::to_path_buf);
    }

    find_in_path(OsStr::new(env.search_path()?), path.as_os_str())
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|candidate| find_by_path(candidate).is_some())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
