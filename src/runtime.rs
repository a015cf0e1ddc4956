// src/runtime.rs

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dispatch::{report_dispatch_error, Dispatcher};
use crate::errors::Result;
use crate::generator::Generator;

/// Drains the inbox backlog, then feeds settled inbox paths to the
/// dispatcher, one at a time, until the shutdown future resolves or the
/// watcher goes away.
///
/// A task that is already running when shutdown is requested in the main
/// loop is allowed to finish so it is not stranded in `Processing/`. During
/// the backlog drain shutdown wins at once; the interrupted task stays in
/// `Processing/` untouched.
pub struct Runtime<G: Generator> {
    dispatcher: Dispatcher<G>,
    candidate_rx: mpsc::Receiver<PathBuf>,
}

impl<G: Generator> fmt::Debug for Runtime<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("familiar", &self.dispatcher.config().name)
            .finish_non_exhaustive()
    }
}

impl<G: Generator> Runtime<G> {
    pub fn new(dispatcher: Dispatcher<G>, candidate_rx: mpsc::Receiver<PathBuf>) -> Self {
        Self {
            dispatcher,
            candidate_rx,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<G> {
        &self.dispatcher
    }

    /// Main loop.
    pub async fn run<S>(mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        info!(familiar = %self.dispatcher.config().name, "runtime started");
        tokio::pin!(shutdown);

        if !drain_until_shutdown(&self.dispatcher, shutdown.as_mut()).await? {
            return Ok(());
        }

        loop {
            let path = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested; stopping");
                    break;
                }
                next = self.candidate_rx.recv() => match next {
                    Some(path) => path,
                    None => {
                        info!("candidate channel closed; exiting");
                        break;
                    }
                },
            };

            debug!(?path, "runtime received candidate");

            if let Err(err) = self.dispatcher.dispatch(&path).await {
                report_dispatch_error(&err);
            }
        }

        info!("runtime exiting");
        Ok(())
    }
}

/// Drain the inbox unless `shutdown` resolves first.
///
/// Returns `false` when shutdown cut the drain short. Dropping the drain
/// stops the running generator.
pub async fn drain_until_shutdown<G, S>(
    dispatcher: &Dispatcher<G>,
    shutdown: Pin<&mut S>,
) -> Result<bool>
where
    G: Generator,
    S: Future<Output = ()>,
{
    tokio::select! {
        drained = dispatcher.drain_inbox() => {
            drained?;
            Ok(true)
        }
        _ = shutdown => {
            info!("shutdown requested during inbox drain; stopping");
            Ok(false)
        }
    }
}
