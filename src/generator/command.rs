// src/generator/command.rs

//! Production generator: an external command fed on stdin.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{compose_input, GenerationFailure, GenerationResult, Generator};

/// How long to keep draining stdout/stderr after the process has exited.
///
/// Grandchildren that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs `program args...`, writes the prompt to stdin and reads the answer
/// from stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            workdir: None,
        }
    }

    /// Working directory for the spawned process.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, input: String, timeout: Duration) -> GenerationResult {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout can take down everything the
        // generator started, not just the generator itself.
        #[cfg(unix)]
        cmd.process_group(0);

        info!(
            program = %self.program,
            input_bytes = input.len(),
            timeout = ?timeout,
            "starting generator process"
        );
        let started = Instant::now();

        let mut child = cmd.spawn().map_err(|err| GenerationFailure::Io {
            detail: spawn_error_detail(&self.program, &err),
        })?;
        // Declared after `child` so it drops first, while the group leader
        // is still unreaped and its id cannot have been reused.
        let group = ProcessGroup::new(child.id());

        let stdin = child.stdin.take();
        let writer: JoinHandle<io::Result<()>> = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok(())
        });
        let stdout_reader = child.stdout.take().map(|out| tokio::spawn(read_lossy(out)));
        let stderr_reader = child.stderr.take().map(|err| tokio::spawn(read_lossy(err)));

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                abort_all(&writer, &stdout_reader, &stderr_reader);
                return Err(GenerationFailure::Io {
                    detail: format!("waiting for {:?}: {err}", self.program),
                });
            }
            Err(_elapsed) => {
                warn!(
                    program = %self.program,
                    timeout = ?timeout,
                    "generator timed out; killing process"
                );
                group.kill();
                // `kill` also reaps the child, so nothing is left behind.
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill timed-out generator process");
                }
                abort_all(&writer, &stdout_reader, &stderr_reader);
                return Err(GenerationFailure::Timeout { after: timeout });
            }
        };

        let stdout = drain(stdout_reader).await;
        let stderr = drain(stderr_reader).await;
        let code = status.code().unwrap_or(-1);

        info!(
            program = %self.program,
            exit_code = code,
            success = status.success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generator process exited"
        );

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("generator closed stdin before reading the whole prompt");
            }
            Ok(Err(err)) => {
                return Err(GenerationFailure::Io {
                    detail: format!("writing prompt to {:?}: {err}", self.program),
                });
            }
            Err(err) => {
                return Err(GenerationFailure::Io {
                    detail: format!("prompt writer task failed: {err}"),
                });
            }
        }

        if !status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(GenerationFailure::Process { code, detail });
        }

        Ok(stdout.trim().to_string())
    }
}

impl Generator for CommandGenerator {
    fn invoke<'a>(
        &'a self,
        prompt: &'a str,
        system_prompt: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = GenerationResult> + Send + 'a>> {
        let input = compose_input(prompt, system_prompt);
        Box::pin(self.run(input, timeout))
    }
}

/// The generator's process group. Dropping it (a finished run, or a
/// dispatch future cancelled mid-run) kills whatever is still in the group.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    #[cfg(unix)]
    fn kill(&self) {
        let Some(pgid) = self.leader.and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return;
        };
        // SAFETY: killpg only sends a signal. The group was created for a
        // child we spawned and its id stays taken while any member lives.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!(pgid, error = %err, "failed to kill generator process group");
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

fn spawn_error_detail(program: &str, err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::NotFound {
        format!("command {program:?} not found; is it installed and on PATH?")
    } else {
        format!("spawning {program:?}: {err}")
    }
}

async fn read_lossy<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn drain(handle: Option<JoinHandle<io::Result<String>>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(Ok(text))) => text,
        Ok(Ok(Err(err))) => {
            warn!(error = %err, "failed to read generator output");
            String::new()
        }
        Ok(Err(err)) => {
            warn!(error = %err, "generator output reader panicked");
            String::new()
        }
        Err(_) => {
            warn!("generator output pipe still open after exit; discarding it");
            handle.abort();
            String::new()
        }
    }
}

fn abort_all<T>(
    writer: &JoinHandle<io::Result<()>>,
    stdout: &Option<JoinHandle<T>>,
    stderr: &Option<JoinHandle<T>>,
) {
    writer.abort();
    for handle in [stdout, stderr].into_iter().flatten() {
        handle.abort();
    }
}
