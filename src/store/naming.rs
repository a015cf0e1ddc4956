// src/store/naming.rs

//! File-name rules for the task directories.

use std::path::{Path, PathBuf};

/// Extensions (compared ASCII case-insensitively) that make a file a task.
const TASK_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Returns true if `path` names something the dispatcher should pick up.
///
/// Only the name is inspected: markdown extension, not hidden. Editors and
/// sync tools drop dotfiles (`.task.md.swp`, `.~lock`) next to real
/// documents while they work.
pub fn is_task_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TASK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// First free path for `name` inside `dir`: `name`, then `stem-1.ext`,
/// `stem-2.ext`, ...
///
/// Candidates are checked on the filesystem one at a time. Another process can
/// still create the chosen name between the check and the caller's rename;
/// with a single dispatcher per directory that window is accepted.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }

    let mut n: u32 = 1;
    loop {
        let candidate = dir.join(suffixed_name(name, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// `task.md` + 2 -> `task-2.md`; `notes` + 1 -> `notes-1`.
pub fn suffixed_name(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{n}.{ext}"),
        None => format!("{stem}-{n}"),
    }
}
