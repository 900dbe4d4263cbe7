//! Helpers for canonical workspace-relative paths.
//!
//! Module identities are root-relative and `/`-separated on every platform.
//! The workspace root itself is the empty string.

use std::path::Path;

/// Converts a relative filesystem path to its canonical `/`-separated form.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a canonical directory and a relative tail.
#[must_use]
pub fn join(dir: &str, tail: &str) -> String {
    match (dir.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{dir}/{tail}"),
    }
}

/// Directory part of a canonical path (`""` for top-level files).
#[must_use]
pub fn parent(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

/// Last segment of a canonical path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rfind('/').map_or(path, |i| &path[i + 1..])
}

/// Extension of a canonical path, without the dot.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    name.rfind('.')
        .filter(|&i| i > 0)
        .map(|i| &name[i + 1..])
}

/// Returns true if `path` equals `dir` or lies below it.
#[must_use]
pub fn is_within(path: &str, dir: &str) -> bool {
    dir.is_empty()
        || path == dir
        || (path.starts_with(dir) && path.as_bytes().get(dir.len()) == Some(&b'/'))
}

/// Lexically resolves `.` and `..` segments of `tail` against `dir`.
///
/// Returns `None` when the result would escape the workspace root.
#[must_use]
pub fn normalize(dir: &str, tail: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in tail.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Displays a canonical directory, rendering the root as `"."`.
#[must_use]
pub fn display_dir(dir: &str) -> &str {
    if dir.is_empty() {
        "."
    } else {
        dir
    }
}
