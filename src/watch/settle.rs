// src/watch/settle.rs

//! Settle bookkeeping shared by both watch strategies.
//!
//! Neither type touches the filesystem or spawns anything; the async loops in
//! [`super::event`] and [`super::poll`] feed them observations and act on
//! what they return.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

/// Per-path debounce timers for event mode.
///
/// Every activity on a path pushes its deadline to `now + settle`. A path is
/// due once its deadline passes without further activity.
#[derive(Debug)]
pub struct SettleTimers {
    settle: Duration,
    deadlines: HashMap<PathBuf, Instant>,
}

impl SettleTimers {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            deadlines: HashMap::new(),
        }
    }

    /// Record activity on `path`, (re)starting its timer.
    pub fn touch(&mut self, path: &Path, now: Instant) {
        self.deadlines.insert(path.to_path_buf(), now + self.settle);
    }

    /// Forget `path` (it was removed or renamed away).
    pub fn cancel(&mut self, path: &Path) {
        self.deadlines.remove(path);
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.deadlines.contains_key(path)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every path whose deadline is at or before `now`,
    /// sorted by name.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &due {
            self.deadlines.remove(path);
        }
        due.sort();
        due
    }
}

/// What poll mode has already emitted, keyed by path and modification time.
///
/// A file is emitted once per (path, mtime). If it disappears from the inbox
/// and later comes back it is a new drop and will be emitted again, even when
/// `mv` preserved the old mtime.
#[derive(Debug)]
pub struct SettledScan {
    settle: Duration,
    emitted: HashMap<PathBuf, SystemTime>,
}

impl SettledScan {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            emitted: HashMap::new(),
        }
    }

    /// Feed one directory listing; returns the paths to emit now, in the
    /// order given.
    pub fn observe(&mut self, listing: &[(PathBuf, SystemTime)], now: SystemTime) -> Vec<PathBuf> {
        self.emitted
            .retain(|path, _| listing.iter().any(|(listed, _)| listed == path));

        let mut ready = Vec::new();
        for (path, mtime) in listing {
            if self.emitted.get(path) == Some(mtime) {
                continue;
            }
            // An mtime in the future (clock skew) counts as "just written".
            let age = now.duration_since(*mtime).unwrap_or(Duration::ZERO);
            if age >= self.settle {
                self.emitted.insert(path.clone(), *mtime);
                ready.push(path.clone());
            }
        }
        ready
    }
}
