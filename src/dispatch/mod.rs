// src/dispatch/mod.rs

//! Task dispatch: one settled inbox file in, one finished document out.
//!
//! For each candidate the [`Dispatcher`]:
//! 1. claims it into `Processing/` (losing a race is a silent skip),
//! 2. reads and parses the document,
//! 3. builds the prompt and invokes the [`Generator`],
//! 4. appends a run record (or an error section), updates the metadata,
//! 5. moves the document to `Done/` or `Failed/`.
//!
//! The document on disk is not modified until the generator has finished,
//! so a crash mid-run leaves an untouched file in `Processing/`.
//!
//! Tasks are handled strictly one at a time; callers await [`Dispatcher::dispatch`]
//! before handing over the next path.

pub mod prompt;
pub mod record;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::config::FamiliarConfig;
use crate::errors::{FamiliarError, Result};
use crate::frontmatter::{self, Document, Metadata};
use crate::generator::{GenerationFailure, Generator};
use crate::store::{ClaimOutcome, ClaimedTask, FinalState, TaskStore};
use crate::types::TaskStatus;

pub use prompt::build_prompt;
pub use record::{append_section, failure_record, last_run_stamp, run_record};

/// What happened to one candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not an eligible file directly in the inbox.
    Ignored { path: PathBuf },
    /// Someone else claimed (or removed) the file first.
    Skipped { path: PathBuf },
    Done {
        task: String,
        path: PathBuf,
        iteration: u64,
    },
    Failed {
        task: String,
        path: PathBuf,
        reason: String,
    },
}

pub struct Dispatcher<G: Generator> {
    config: Arc<FamiliarConfig>,
    store: TaskStore,
    generator: G,
    system_prompt: String,
}

impl<G: Generator> Dispatcher<G> {
    pub fn new(
        config: Arc<FamiliarConfig>,
        store: TaskStore,
        generator: G,
        system_prompt: String,
    ) -> Self {
        Self {
            config,
            store,
            generator,
            system_prompt,
        }
    }

    pub fn config(&self) -> &FamiliarConfig {
        &self.config
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Dispatch every file currently waiting in the inbox, in name order.
    ///
    /// Per-task errors are logged and do not stop the drain. Only a failure
    /// to list the inbox is returned.
    pub async fn drain_inbox(&self) -> Result<Vec<DispatchOutcome>> {
        let pending = self.store.list_inbox()?;
        if !pending.is_empty() {
            info!(familiar = %self.config.name, count = pending.len(), "draining inbox");
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for path in pending {
            match self.dispatch(&path).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => report_dispatch_error(&err),
            }
        }
        Ok(outcomes)
    }

    /// Run one candidate through the full lifecycle.
    ///
    /// Returns `Err` only when a claimed task could not be moved out of
    /// `Processing/` at all ([`FamiliarError::FinalizeError`]) or the claim
    /// itself failed for a reason other than losing a race.
    pub async fn dispatch(&self, candidate: &Path) -> Result<DispatchOutcome> {
        if !self.store.is_inbox_candidate(candidate) {
            debug!(path = ?candidate, "not an inbox task file; ignoring");
            return Ok(DispatchOutcome::Ignored {
                path: candidate.to_path_buf(),
            });
        }

        let claimed = match self.store.claim(candidate)? {
            ClaimOutcome::Claimed(task) => task,
            ClaimOutcome::Raced { path } => {
                // Routine: the startup drain and the watcher can both report a file.
                debug!(familiar = %self.config.name, ?path, "skipped (already picked up)");
                return Ok(DispatchOutcome::Skipped { path });
            }
        };

        info!(familiar = %self.config.name, task = %claimed.name(), "processing");

        let text = match read_document(claimed.path()) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    familiar = %self.config.name,
                    task = %claimed.name(),
                    error = %err,
                    "could not read task document"
                );
                return self.move_to_failed(&claimed, format!("unreadable document: {err}"));
            }
        };

        let doc = match frontmatter::try_parse(&text) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(
                    task = %claimed.name(),
                    error = %err,
                    "malformed metadata block; treating the whole file as body"
                );
                Document {
                    metadata: Metadata::new(),
                    body: text,
                }
            }
        };

        let previous = doc.metadata.iteration().unwrap_or(0);
        let Some(iteration) = previous.checked_add(1) else {
            warn!(
                familiar = %self.config.name,
                task = %claimed.name(),
                iteration = previous,
                "iteration counter cannot advance"
            );
            return self.record_failure(
                &claimed,
                doc,
                previous,
                "invalid metadata",
                &format!("iteration {previous} cannot be incremented"),
                "Lower or remove the `iteration` key and move the file back to Jobs.",
                format!("invalid metadata: iteration {previous} cannot be incremented"),
                Local::now(),
            );
        };
        let access = self.config.access_paths();
        let prompt = build_prompt(&self.config.name, &access, iteration, &doc.body);

        debug!(task = %claimed.name(), iteration, prompt_len = prompt.len(), "invoking generator");
        let result = self
            .generator
            .invoke(&prompt, &self.system_prompt, self.config.timeout)
            .await;
        let now = Local::now();

        match result {
            Ok(output) => self.complete(&claimed, doc, iteration, &output, now),
            Err(failure) => {
                let (summary, detail) = describe_failure(&failure);
                warn!(
                    familiar = %self.config.name,
                    task = %claimed.name(),
                    kind = failure.kind(),
                    error = %failure,
                    "generation failed"
                );
                self.record_failure(
                    &claimed,
                    doc,
                    iteration,
                    failure.kind(),
                    &summary,
                    &detail,
                    failure.to_string(),
                    now,
                )
            }
        }
    }

    fn complete(
        &self,
        claimed: &ClaimedTask,
        doc: Document,
        iteration: u64,
        output: &str,
        now: DateTime<Local>,
    ) -> Result<DispatchOutcome> {
        let Document { metadata, mut body } = doc;
        append_section(
            &mut body,
            &run_record(&self.config.name, iteration, &now, output),
        );

        let mut done_meta = metadata.clone();
        done_meta.set_iteration(iteration);
        done_meta.set_status(TaskStatus::Done);
        done_meta.set_last_run(last_run_stamp(&now));

        let rendered = frontmatter::render(&done_meta, &body);
        let finished = fs::write(claimed.path(), rendered)
            .and_then(|()| self.store.finalize(claimed, FinalState::Done));

        match finished {
            Ok(path) => {
                info!(
                    familiar = %self.config.name,
                    task = %claimed.name(),
                    iteration,
                    "done"
                );
                Ok(DispatchOutcome::Done {
                    task: claimed.name().to_string(),
                    path,
                    iteration,
                })
            }
            Err(err) => {
                error!(
                    task = %claimed.name(),
                    error = %err,
                    "could not complete task; moving it to Failed"
                );
                // Keep the generated text; the iteration only advances on a
                // completed run.
                let doc = Document { metadata, body };
                self.record_failure(
                    claimed,
                    doc,
                    iteration,
                    "i/o failure",
                    "could not move the finished document to Done",
                    &err.to_string(),
                    format!("i/o failure: {err}"),
                    Local::now(),
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_failure(
        &self,
        claimed: &ClaimedTask,
        doc: Document,
        iteration: u64,
        kind: &str,
        summary: &str,
        detail: &str,
        reason: String,
        now: DateTime<Local>,
    ) -> Result<DispatchOutcome> {
        let Document {
            mut metadata,
            mut body,
        } = doc;
        append_section(
            &mut body,
            &failure_record(&self.config.name, iteration, &now, kind, summary, detail),
        );
        metadata.set_status(TaskStatus::Failed);
        metadata.set_last_run(last_run_stamp(&now));

        let reason = match fs::write(claimed.path(), frontmatter::render(&metadata, &body)) {
            Ok(()) => reason,
            Err(err) => {
                error!(
                    task = %claimed.name(),
                    error = %err,
                    reason = %reason,
                    "could not write failure details into the document"
                );
                format!("{reason} (not recorded in the document: {err})")
            }
        };

        self.move_to_failed(claimed, reason)
    }

    fn move_to_failed(&self, claimed: &ClaimedTask, reason: String) -> Result<DispatchOutcome> {
        match self.store.finalize(claimed, FinalState::Failed) {
            Ok(path) => {
                warn!(
                    familiar = %self.config.name,
                    task = %claimed.name(),
                    reason = %reason,
                    "failed"
                );
                Ok(DispatchOutcome::Failed {
                    task: claimed.name().to_string(),
                    path,
                    reason,
                })
            }
            Err(source) => Err(FamiliarError::FinalizeError {
                task: claimed.name().to_string(),
                left_at: claimed.path().to_path_buf(),
                source,
            }),
        }
    }
}

/// Log a dispatch error. Finalize failures need a human, so they are logged
/// at error level with the path left behind.
pub fn report_dispatch_error(err: &FamiliarError) {
    match err {
        FamiliarError::FinalizeError { task, left_at, .. } => error!(
            task = %task,
            left_at = ?left_at,
            error = %err,
            "task is stuck in Processing; move it back to the inbox to retry"
        ),
        other => error!(error = %other, "dispatch failed"),
    }
}

fn read_document(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// One-line summary and longer detail for an error section.
fn describe_failure(failure: &GenerationFailure) -> (String, String) {
    match failure {
        GenerationFailure::Timeout { after } => (
            format!("generator timed out after {after:?} and was stopped"),
            String::new(),
        ),
        GenerationFailure::Process { code, detail } => {
            (format!("generator exited with code {code}"), detail.clone())
        }
        GenerationFailure::Io { detail } => {
            ("generator could not be run".to_string(), detail.clone())
        }
    }
}
