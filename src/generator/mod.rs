// src/generator/mod.rs

//! Generator client: the boundary to the external text-generation process.
//!
//! The dispatcher talks to a [`Generator`] instead of spawning processes
//! itself. This makes it easy to swap in a scripted fake in tests while the
//! production implementation lives in [`command`].
//!
//! There are no retries at this layer. A failed invocation is reported once
//! and the dispatcher records it in the document.

pub mod command;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub use command::CommandGenerator;

/// Why an invocation produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    /// The process did not finish within the timeout and was killed.
    #[error("generator timed out after {after:?}")]
    Timeout { after: Duration },

    /// The process ran and exited unsuccessfully. `code` is -1 when it was
    /// terminated by a signal.
    #[error("generator exited with code {code}: {detail}")]
    Process { code: i32, detail: String },

    /// The process could not be started or talked to.
    #[error("generator I/O failure: {detail}")]
    Io { detail: String },
}

impl GenerationFailure {
    /// Short label written into the document's error section.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::Timeout { .. } => "timeout",
            GenerationFailure::Process { .. } => "process failure",
            GenerationFailure::Io { .. } => "i/o failure",
        }
    }
}

pub type GenerationResult = std::result::Result<String, GenerationFailure>;

/// Trait abstracting how prompts are turned into generated text.
///
/// Production code uses [`CommandGenerator`]; tests provide their own
/// implementation that doesn't spawn real processes.
pub trait Generator: Send + Sync {
    /// Generate text for `prompt`, with `system_prompt` prepended.
    ///
    /// Must resolve within roughly `timeout` and must not leave anything
    /// running behind when it does.
    fn invoke<'a>(
        &'a self,
        prompt: &'a str,
        system_prompt: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = GenerationResult> + Send + 'a>>;
}

/// The exact text written to the generator's stdin.
pub fn compose_input(prompt: &str, system_prompt: &str) -> String {
    let system_prompt = system_prompt.trim();
    if system_prompt.is_empty() {
        prompt.to_string()
    } else {
        format!("{system_prompt}\n\n{prompt}")
    }
}
