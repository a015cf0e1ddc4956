use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use familiar::generator::{GenerationFailure, GenerationResult, Generator};

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub prompt: String,
    pub system_prompt: String,
    pub timeout: Duration,
}

/// A generator that:
/// - records every prompt it is given
/// - answers from a script of queued results, in order
/// - answers `"fake output"` once the script is exhausted
///
/// and optionally runs a hook or sleeps before answering.
///
/// Clones share the script and the call log, so a test can keep one clone
/// and hand another to the dispatcher.
#[derive(Clone, Default)]
pub struct FakeGenerator {
    script: Arc<Mutex<VecDeque<GenerationResult>>>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    on_invoke: Arc<Mutex<Option<InvokeHook>>>,
}

type InvokeHook = Arc<dyn Fn() + Send + Sync>;

impl fmt::Debug for FakeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeGenerator")
            .field("script", &self.script)
            .field("calls", &self.calls)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, text: &str) -> &Self {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, failure: GenerationFailure) -> &Self {
        self.script.lock().unwrap().push_back(Err(failure));
        self
    }

    /// Sleep this long before every answer.
    pub fn with_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Run `hook` at the start of every invocation, while the task sits in
    /// `Processing/`.
    pub fn on_invoke(&self, hook: impl Fn() + Send + Sync + 'static) -> &Self {
        *self.on_invoke.lock().unwrap() = Some(Arc::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Generator for FakeGenerator {
    fn invoke<'a>(
        &'a self,
        prompt: &'a str,
        system_prompt: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = GenerationResult> + Send + 'a>> {
        self.calls.lock().unwrap().push(FakeCall {
            prompt: prompt.to_string(),
            system_prompt: system_prompt.to_string(),
            timeout,
        });
        let hook = self.on_invoke.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
        let delay = *self.delay.lock().unwrap();
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("fake output".to_string()));

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next
        })
    }
}
