// src/watch/mod.rs

//! Inbox watching.
//!
//! This module is responsible for:
//! - Noticing new task files in `Jobs/`.
//! - Holding them back until they have settled (no writes for the settle
//!   delay), so a half-written file is never dispatched.
//! - Handing settled paths to the dispatcher over a channel.
//!
//! Two strategies implement [`InboxWatcher`]: [`EventWatcher`] (filesystem
//! notifications via `notify`) and [`PollWatcher`] (periodic listing). The
//! strategy is picked once at startup by [`select_watcher`] and both obey
//! the same contract: a settled drop is emitted exactly once, and a file
//! that leaves the inbox and comes back later is a new drop.
//!
//! It does **not** claim or read files; that is the dispatcher's job.

pub mod event;
pub mod poll;
pub mod settle;

use std::path::{Path, PathBuf};

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::WatchSettings;
use crate::errors::Result;
use crate::types::{WatchMode, WatchPreference};

pub use event::EventWatcher;
pub use poll::PollWatcher;
pub use settle::{SettleTimers, SettledScan};

/// Capacity of the watcher -> dispatcher channel.
pub const CANDIDATE_CHANNEL_CAPACITY: usize = 64;

/// A strategy for turning inbox activity into settled candidate paths.
pub trait InboxWatcher: Send {
    fn mode(&self) -> WatchMode;

    /// Start emitting settled paths on `tx`.
    ///
    /// Emission stops when the returned handle is dropped or the receiving
    /// side of `tx` is closed.
    fn start(self: Box<Self>, tx: mpsc::Sender<PathBuf>) -> WatcherHandle;
}

/// Keeps a running watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    mode: WatchMode,
    task: JoinHandle<()>,
    _subscription: Option<RecommendedWatcher>,
}

impl WatcherHandle {
    pub(crate) fn new(
        mode: WatchMode,
        task: JoinHandle<()>,
        subscription: Option<RecommendedWatcher>,
    ) -> Self {
        Self {
            mode,
            task,
            _subscription: subscription,
        }
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Pick the watch strategy for this process.
///
/// With [`WatchPreference::Auto`] an event subscription is attempted first and
/// polling is used if it cannot be established.
pub fn select_watcher(inbox: &Path, settings: &WatchSettings) -> Result<Box<dyn InboxWatcher>> {
    let poll = || -> Box<dyn InboxWatcher> {
        Box::new(PollWatcher::new(
            inbox,
            settings.settle_delay,
            settings.poll_interval,
        ))
    };

    match settings.preference {
        WatchPreference::Poll => Ok(poll()),
        WatchPreference::Event => Ok(Box::new(EventWatcher::new(inbox, settings.settle_delay)?)),
        WatchPreference::Auto => match EventWatcher::new(inbox, settings.settle_delay) {
            Ok(watcher) => Ok(Box::new(watcher)),
            Err(err) => {
                warn!(error = %err, "filesystem events unavailable; falling back to polling");
                Ok(poll())
            }
        },
    }
}

/// Select a strategy, start it, and return the handle plus the receiving end
/// of the candidate channel.
pub fn spawn_watcher(
    inbox: &Path,
    settings: &WatchSettings,
) -> Result<(WatcherHandle, mpsc::Receiver<PathBuf>)> {
    let watcher = select_watcher(inbox, settings)?;
    let (tx, rx) = mpsc::channel(CANDIDATE_CHANNEL_CAPACITY);
    Ok((watcher.start(tx), rx))
}
