// src/watch/poll.rs

//! Polling inbox watcher, used where filesystem events are unavailable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::store::is_task_file;
use crate::types::WatchMode;
use crate::watch::settle::SettledScan;
use crate::watch::{InboxWatcher, WatcherHandle};

/// Lists the inbox every `interval` and emits files whose mtime is at least
/// `settle` old.
#[derive(Debug, Clone)]
pub struct PollWatcher {
    inbox: PathBuf,
    settle: Duration,
    interval: Duration,
}

impl PollWatcher {
    pub fn new(inbox: impl Into<PathBuf>, settle: Duration, interval: Duration) -> Self {
        let inbox = inbox.into();
        let inbox = inbox.canonicalize().unwrap_or(inbox);
        Self {
            inbox,
            settle,
            interval,
        }
    }
}

impl InboxWatcher for PollWatcher {
    fn mode(&self) -> WatchMode {
        WatchMode::Poll
    }

    fn start(self: Box<Self>, tx: mpsc::Sender<PathBuf>) -> WatcherHandle {
        info!(
            inbox = ?self.inbox,
            interval = ?self.interval,
            settle = ?self.settle,
            "watching inbox by polling"
        );
        let task = tokio::spawn(run_poll_loop(*self, tx));
        WatcherHandle::new(WatchMode::Poll, task, None)
    }
}

async fn run_poll_loop(watcher: PollWatcher, tx: mpsc::Sender<PathBuf>) {
    let mut scan = SettledScan::new(watcher.settle);
    let mut ticker = tokio::time::interval(watcher.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let inbox = watcher.inbox.clone();
        let listing = match tokio::task::spawn_blocking(move || list_with_mtime(&inbox)).await {
            Ok(Ok(listing)) => listing,
            Ok(Err(err)) => {
                warn!(inbox = ?watcher.inbox, error = %err, "failed to list inbox");
                continue;
            }
            Err(err) => {
                warn!(error = %err, "inbox listing task panicked");
                continue;
            }
        };

        for path in scan.observe(&listing, SystemTime::now()) {
            debug!(?path, "path settled");
            if tx.send(path).await.is_err() {
                debug!("candidate channel closed; stopping poll watcher");
                return;
            }
        }
    }
}

/// Eligible inbox files with their modification times, sorted by name.
fn list_with_mtime(inbox: &Path) -> io::Result<Vec<(PathBuf, SystemTime)>> {
    let mut listing = Vec::new();
    for entry in fs::read_dir(inbox)? {
        let entry = entry?;
        let path = entry.path();
        if !is_task_file(&path) {
            continue;
        }
        // The file may be claimed between read_dir and metadata.
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if meta.is_file() {
            listing.push((path, meta.modified()?));
        }
    }
    listing.sort();
    Ok(listing)
}
