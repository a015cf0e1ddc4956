// tests/generator_command.rs
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::process::Command as StdCommand;
use std::time::{Duration, Instant};

use familiar::generator::{compose_input, CommandGenerator, GenerationFailure, Generator};
use familiar_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn sh(script: &str) -> CommandGenerator {
    CommandGenerator::new("sh", vec!["-c".to_string(), script.to_string()])
}

#[test]
fn system_prompt_is_prepended() {
    assert_eq!(compose_input("task", "  be terse \n"), "be terse\n\ntask");
    assert_eq!(compose_input("task", "   "), "task");
}

#[tokio::test]
async fn stdout_is_the_answer() -> TestResult {
    init_tracing();
    let generator = CommandGenerator::new("cat", vec![]);

    let output = with_timeout(generator.invoke(
        "Write a haiku.",
        "You are terse.",
        Duration::from_secs(5),
    ))
    .await?;

    assert_eq!(output, "You are terse.\n\nWrite a haiku.");
    Ok(())
}

#[tokio::test]
async fn runs_in_the_configured_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let generator = sh("pwd").with_workdir(dir.path());

    let output = with_timeout(generator.invoke("", "", Duration::from_secs(5))).await?;

    assert_eq!(
        fs::canonicalize(output)?,
        fs::canonicalize(dir.path())?
    );
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_reports_stderr() -> TestResult {
    init_tracing();
    let generator = sh("cat > /dev/null; echo 'rate limited' >&2; exit 3");

    let result = with_timeout(generator.invoke("prompt", "", Duration::from_secs(5))).await;

    assert_eq!(
        result,
        Err(GenerationFailure::Process {
            code: 3,
            detail: "rate limited".to_string(),
        })
    );
    Ok(())
}

#[tokio::test]
async fn nonzero_exit_without_stderr_falls_back_to_stdout() -> TestResult {
    init_tracing();
    let generator = sh("echo 'usage: something'; exit 1");

    match with_timeout(generator.invoke("prompt", "", Duration::from_secs(5))).await {
        Err(GenerationFailure::Process { code, detail }) => {
            assert_eq!(code, 1);
            assert_eq!(detail, "usage: something");
        }
        other => panic!("expected Process failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_program_is_an_io_failure() -> TestResult {
    init_tracing();
    let generator = CommandGenerator::new("familiar-no-such-generator-xyz", vec![]);

    match with_timeout(generator.invoke("prompt", "", Duration::from_secs(5))).await {
        Err(GenerationFailure::Io { detail }) => {
            assert!(detail.contains("not found"), "detail: {detail}");
        }
        other => panic!("expected Io failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn timeout_kills_the_process() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
    let generator = sh(&script);

    let started = Instant::now();
    let result = with_timeout(generator.invoke("prompt", "", Duration::from_secs(1))).await;
    let elapsed = started.elapsed();

    assert_eq!(
        result,
        Err(GenerationFailure::Timeout {
            after: Duration::from_secs(1)
        })
    );
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");

    let pid = fs::read_to_string(&pid_file)?.trim().to_string();
    assert!(!still_running(&pid).await, "process {pid} is still running");
    Ok(())
}

#[tokio::test]
async fn timeout_kills_processes_the_generator_started() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let pid_file = dir.path().join("pid");
    // The sleep is a child of the shell, not the shell itself.
    let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
    let generator = sh(&script);

    let started = Instant::now();
    let result = with_timeout(generator.invoke("prompt", "", Duration::from_secs(1))).await;

    assert!(matches!(result, Err(GenerationFailure::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(3));

    let pid = fs::read_to_string(&pid_file)?.trim().to_string();
    assert!(!pid.is_empty());
    assert!(!still_running(&pid).await, "background process {pid} survived the timeout");
    Ok(())
}

/// True if `pid` is alive and not a zombie, checked for up to one second
/// so an orphan has time to be reaped by init.
async fn still_running(pid: &str) -> bool {
    for _ in 0..20 {
        if !is_live(pid) {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    is_live(pid)
}

fn is_live(pid: &str) -> bool {
    let proc_dir = std::path::Path::new("/proc");
    if proc_dir.is_dir() {
        return match fs::read_to_string(proc_dir.join(pid).join("stat")) {
            // Format: `pid (comm) state ...`; comm may contain spaces.
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        };
    }
    StdCommand::new("kill")
        .args(["-0", pid])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
