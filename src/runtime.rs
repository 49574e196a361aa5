//! Runtime helpers for locating the interpreter.
//!
//! Centralizes executable detection and PATH resolution so the runner and the
//! CLI resolve `bash` (or an override) the same way.

use std::env;
use std::path::{Path, PathBuf};

/// Returns true when a file exists and has any execute bit set.
pub fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = std::fs::metadata(path) {
            return meta.permissions().mode() & 0o111 != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Find an executable by name somewhere on PATH.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    for dir in env::split_paths(&paths) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Resolve an interpreter given either a path or a bare command name.
///
/// Anything containing a separator is taken literally and must be executable;
/// bare names go through PATH.
pub fn resolve_interpreter(interpreter: &Path) -> Option<PathBuf> {
    if interpreter.components().count() > 1 {
        return is_executable(interpreter).then(|| interpreter.to_path_buf());
    }
    find_on_path(&interpreter.to_string_lossy())
}

/// Split comma- or whitespace-delimited lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
