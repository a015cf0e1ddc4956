// src/store/mod.rs

//! Directory-backed task store.
//!
//! A task's lifecycle state is the directory it lives in:
//!
//! ```text
//! <root>/Jobs/        inbox, humans drop files here
//! <root>/Processing/  claimed by a dispatcher, owned exclusively by it
//! <root>/Done/        last run succeeded
//! <root>/Failed/      last run failed (diagnostics are in the document)
//! ```
//!
//! Every transition is a single `rename(2)` within one filesystem. The rename
//! out of `Jobs/` is the only mutual-exclusion primitive: when two claimers
//! race on one file, exactly one rename succeeds and the other sees the
//! source vanish.

pub mod naming;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{FamiliarError, Result};

pub use naming::{is_task_file, unique_destination};

pub const INBOX_DIR: &str = "Jobs";
pub const PROCESSING_DIR: &str = "Processing";
pub const DONE_DIR: &str = "Done";
pub const FAILED_DIR: &str = "Failed";
pub const SYSTEM_PROMPT_FILE: &str = "system-prompt.md";

/// Terminal directory a claimed task is moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalState {
    Done,
    Failed,
}

/// A task that has been moved into `Processing/` by this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    name: String,
    path: PathBuf,
}

impl ClaimedTask {
    /// Task identity: the base name the file had in the inbox.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current location inside `Processing/`.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of trying to claim an inbox file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(ClaimedTask),
    /// The source was gone by the time we renamed it: somebody else claimed
    /// it, or the user moved it away. Not an error.
    Raced { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    root: PathBuf,
}

impl TaskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.root.join(INBOX_DIR)
    }

    pub fn processing_dir(&self) -> PathBuf {
        self.root.join(PROCESSING_DIR)
    }

    pub fn done_dir(&self) -> PathBuf {
        self.root.join(DONE_DIR)
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.root.join(FAILED_DIR)
    }

    pub fn system_prompt_path(&self) -> PathBuf {
        self.root.join(SYSTEM_PROMPT_FILE)
    }

    /// Create the four task directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.inbox_dir(),
            self.processing_dir(),
            self.done_dir(),
            self.failed_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        debug!(root = ?self.root, "task directories ready");
        Ok(())
    }

    /// Eligible task files currently in the inbox, sorted by name.
    pub fn list_inbox(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(self.inbox_dir())? {
            let path = entry?.path();
            if is_task_file(&path) && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Returns true if `path` is an eligible file directly inside the inbox.
    pub fn is_inbox_candidate(&self, path: &Path) -> bool {
        let in_inbox = path
            .parent()
            .is_some_and(|parent| same_dir(parent, &self.inbox_dir()));
        in_inbox && is_task_file(path)
    }

    /// Atomically move `path` from the inbox into `Processing/`.
    ///
    /// A stale file with the same name in `Processing/` (left behind by a
    /// crash) is never overwritten; the claimed copy gets a suffixed name but
    /// keeps its original identity.
    pub fn claim(&self, path: &Path) -> Result<ClaimOutcome> {
        let name = task_name(path)?;
        let dest = unique_destination(&self.processing_dir(), &name);

        match fs::rename(path, &dest) {
            Ok(()) => {
                debug!(task = %name, to = ?dest, "claimed");
                Ok(ClaimOutcome::Claimed(ClaimedTask { name, path: dest }))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound && !path.exists() => {
                Ok(ClaimOutcome::Raced {
                    path: path.to_path_buf(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Move a claimed task into `Done/` or `Failed/`.
    ///
    /// Both directories resolve name collisions the same way: `task.md`,
    /// `task-1.md`, `task-2.md`, ... Returns the final path.
    pub fn finalize(&self, task: &ClaimedTask, state: FinalState) -> io::Result<PathBuf> {
        let dir = match state {
            FinalState::Done => self.done_dir(),
            FinalState::Failed => self.failed_dir(),
        };
        let dest = unique_destination(&dir, task.name());
        fs::rename(task.path(), &dest)?;
        info!(task = %task.name(), to = ?dest, ?state, "finalized");
        Ok(dest)
    }

    /// Read `<root>/system-prompt.md`, trimmed. Missing file reads as empty.
    pub fn load_system_prompt(&self) -> Result<String> {
        let path = self.system_prompt_path();
        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(?path, bytes = text.len(), "loaded system prompt");
                Ok(text.trim().to_string())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }
}

fn task_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            FamiliarError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a usable task file name: {path:?}"),
            ))
        })
}

/// Compare directories, falling back to canonical paths when the literal
/// paths differ (symlinked roots, `/private/var` on macOS).
fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
