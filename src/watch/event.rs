// src/watch/event.rs

//! Event-driven inbox watcher built on `notify`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::store::is_task_file;
use crate::types::WatchMode;
use crate::watch::settle::SettleTimers;
use crate::watch::{InboxWatcher, WatcherHandle};

/// Inbox watcher driven by filesystem notifications.
///
/// Constructing one subscribes immediately, so events that happen between
/// `new` and `start` are buffered, not lost.
pub struct EventWatcher {
    inbox: PathBuf,
    settle: Duration,
    subscription: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl std::fmt::Debug for EventWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWatcher")
            .field("inbox", &self.inbox)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl EventWatcher {
    /// Subscribe to changes in `inbox`.
    ///
    /// Fails when the platform notification backend is unavailable (no
    /// inotify, watch limit reached, unsupported filesystem); callers fall
    /// back to [`super::PollWatcher`].
    pub fn new(inbox: impl Into<PathBuf>, settle: Duration) -> Result<Self> {
        let inbox = inbox.into();
        // Canonicalize once so event paths share a stable prefix.
        let inbox = inbox.canonicalize().unwrap_or(inbox);

        // Channel from the blocking notify callback into the async world.
        let (event_tx, events) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut subscription = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away when the watcher is shutting down.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;
        subscription.watch(&inbox, RecursiveMode::NonRecursive)?;

        debug!(?inbox, "notify subscription established");

        Ok(Self {
            inbox,
            settle,
            subscription,
            events,
        })
    }
}

impl InboxWatcher for EventWatcher {
    fn mode(&self) -> WatchMode {
        WatchMode::Event
    }

    fn start(self: Box<Self>, tx: mpsc::Sender<PathBuf>) -> WatcherHandle {
        let EventWatcher {
            inbox,
            settle,
            subscription,
            events,
        } = *self;

        info!(?inbox, settle = ?settle, "watching inbox with filesystem events");

        let task = tokio::spawn(run_event_loop(events, settle, tx));
        WatcherHandle::new(WatchMode::Event, task, Some(subscription))
    }
}

async fn run_event_loop(
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    settle: Duration,
    tx: mpsc::Sender<PathBuf>,
) {
    let mut timers = SettleTimers::new(settle);

    loop {
        let next_deadline = timers.next_deadline();

        tokio::select! {
            received = events.recv() => match received {
                Some(Ok(event)) => {
                    debug!(?event, "received notify event");
                    apply_event(&mut timers, &event, Instant::now());
                }
                Some(Err(err)) => warn!(error = %err, "file watch error"),
                None => break,
            },
            _ = sleep_until(next_deadline) => {
                for path in timers.take_due(Instant::now()) {
                    if !path.is_file() {
                        debug!(?path, "settled path is gone; not emitting");
                        continue;
                    }
                    debug!(?path, "path settled");
                    if tx.send(path).await.is_err() {
                        debug!("candidate channel closed; stopping event watcher");
                        return;
                    }
                }
            }
        }
    }

    debug!("event watcher loop finished");
}

/// Update settle timers for one notify event.
///
/// Creation, writes and rename-into arm (or re-arm) a timer. Removal and
/// rename-away cancel it. Access events are ignored.
pub fn apply_event(timers: &mut SettleTimers, event: &Event, now: Instant) {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
            for path in &event.paths {
                timers.cancel(path);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths = [from, to]
            if let Some(from) = event.paths.first() {
                timers.cancel(from);
            }
            if let Some(to) = event.paths.get(1) {
                touch_if_task(timers, to, now);
            }
        }
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                touch_if_task(timers, path, now);
            }
        }
        _ => {}
    }
}

fn touch_if_task(timers: &mut SettleTimers, path: &Path, now: Instant) {
    if is_task_file(path) {
        timers.touch(path, now);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
