// tests/dispatcher.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use familiar::dispatch::DispatchOutcome;
use familiar::errors::FamiliarError;
use familiar::frontmatter;
use familiar::generator::GenerationFailure;
use familiar::types::TaskStatus;
use familiar_test_utils::{init_tracing, with_timeout, FakeGenerator, VaultFixture};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn successful_run_appends_record_and_moves_to_done() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new().with_name("Ada");
    let generator = FakeGenerator::new();
    generator.respond("Roses are red.\nRust is too.");
    let dispatcher = vault.dispatcher(generator.clone());

    let path = vault.drop_job("poem.md", "Write a poem.\n");
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    let done_path = vault.store.done_dir().join("poem.md");
    assert_eq!(
        outcome,
        DispatchOutcome::Done {
            task: "poem.md".to_string(),
            path: done_path.clone(),
            iteration: 1,
        }
    );
    assert!(vault.inbox().is_empty());
    assert!(vault.processing().is_empty());

    let doc = frontmatter::try_parse(&vault.read(&done_path))?;
    assert_eq!(doc.metadata.iteration(), Some(1));
    assert_eq!(doc.metadata.status(), Some(TaskStatus::Done));
    assert!(doc.metadata.last_run().is_some());
    assert!(doc.body.starts_with("Write a poem.\n\n> [!quote] Ada - Report 1 at "));
    assert!(doc.body.contains("\n> Roses are red.\n> Rust is too.\n"));
    Ok(())
}

#[tokio::test]
async fn prompt_carries_identity_boundary_and_body() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new()
        .with_name("Ada")
        .with_allowed_path("/srv/shared")
        .with_system_prompt("Always answer in English.\n");
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    let path = vault.drop_job("q.md", "What is a monad?");
    with_timeout(dispatcher.dispatch(&path)).await?;

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert!(call.prompt.starts_with("You are Ada."));
    assert!(call.prompt.contains(&format!("- {}", vault.root().display())));
    assert!(call.prompt.contains("- /srv/shared"));
    assert!(!call.prompt.contains("iteration"));
    assert!(call.prompt.ends_with("What is a monad?"));
    assert_eq!(call.system_prompt, "Always answer in English.");
    assert_eq!(call.timeout, Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn second_run_builds_on_feedback() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    generator.respond("first draft").respond("second draft");
    let dispatcher = vault.dispatcher(generator.clone());

    let path = vault.drop_job("essay.md", "Write an essay.");
    with_timeout(dispatcher.dispatch(&path)).await?;

    // Human reviews, adds feedback and moves it back to the inbox.
    let done_path = vault.store.done_dir().join("essay.md");
    let mut text = vault.read(&done_path);
    text.push_str("\nMake it shorter.\n");
    fs::remove_file(&done_path)?;
    let path = vault.drop_job("essay.md", &text);

    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;
    assert!(matches!(outcome, DispatchOutcome::Done { iteration: 2, .. }));

    let second_prompt = &generator.calls()[1].prompt;
    assert!(second_prompt.contains("This is iteration 2."));
    assert!(second_prompt.contains("> first draft"));
    assert!(second_prompt.contains("Make it shorter."));

    let doc = frontmatter::try_parse(&vault.read(&done_path))?;
    assert_eq!(doc.metadata.iteration(), Some(2));

    let first = doc.body.find("Report 1 at").ok_or("first record missing")?;
    let feedback = doc.body.find("Make it shorter.").ok_or("feedback missing")?;
    let second = doc.body.find("Report 2 at").ok_or("second record missing")?;
    assert!(first < feedback && feedback < second);
    assert!(doc.body.contains("> first draft"));
    assert!(doc.body.contains("> second draft"));
    Ok(())
}

#[tokio::test]
async fn process_failure_is_visible_in_failed() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    generator.fail(GenerationFailure::Process {
        code: 1,
        detail: "rate limited".to_string(),
    });
    let dispatcher = vault.dispatcher(generator);

    let path = vault.drop_job("task.md", "---\niteration: 3\n---\nRetry me.\n");
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    let failed_path = vault.store.failed_dir().join("task.md");
    match outcome {
        DispatchOutcome::Failed { task, path, reason } => {
            assert_eq!(task, "task.md");
            assert_eq!(path, failed_path);
            assert!(reason.contains("rate limited"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    let text = vault.read(&failed_path);
    assert!(text.contains("rate limited"));
    let doc = frontmatter::try_parse(&text)?;
    assert_eq!(doc.metadata.status(), Some(TaskStatus::Failed));
    assert_eq!(doc.metadata.iteration(), Some(3), "iteration must not advance");
    assert!(doc.body.contains("> [!failure] Familiar - Report 4 failed at "));
    assert!(doc.body.contains("**process failure**"));
    assert!(vault.done().is_empty());
    Ok(())
}

#[tokio::test]
async fn exhausted_iteration_counter_fails_without_running() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    let path = vault.drop_job(
        "ancient.md",
        "---\niteration: 18446744073709551615\n---\nOnce more.\n",
    );
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    match outcome {
        DispatchOutcome::Failed { reason, .. } => {
            assert!(reason.contains("invalid metadata"), "reason: {reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(generator.calls().is_empty());

    let text = vault.read(&vault.store.failed_dir().join("ancient.md"));
    let doc = frontmatter::try_parse(&text)?;
    assert_eq!(doc.metadata.status(), Some(TaskStatus::Failed));
    assert_eq!(doc.metadata.iteration(), Some(u64::MAX));
    assert!(doc.body.starts_with("Once more.\n"));
    assert!(doc.body.contains("**invalid metadata**"));
    Ok(())
}

#[tokio::test]
async fn unwritable_document_still_reports_why_it_failed() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    generator.fail(GenerationFailure::Process {
        code: 2,
        detail: "quota exceeded".to_string(),
    });
    // Swap the claimed file for a directory so writing the error section fails.
    let claimed = vault.store.processing_dir().join("task.md");
    generator.on_invoke(move || {
        let _ = fs::remove_file(&claimed);
        let _ = fs::create_dir(&claimed);
    });
    let dispatcher = vault.dispatcher(generator);

    let path = vault.drop_job("task.md", "Do it.");
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    match outcome {
        DispatchOutcome::Failed { path, reason, .. } => {
            assert_eq!(path, vault.store.failed_dir().join("task.md"));
            assert!(reason.contains("quota exceeded"), "reason: {reason}");
            assert!(reason.contains("not recorded in the document"), "reason: {reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(vault.processing().is_empty());
    Ok(())
}

#[tokio::test]
async fn timeout_failure_names_the_kind() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    generator.fail(GenerationFailure::Timeout {
        after: Duration::from_secs(5),
    });
    let dispatcher = vault.dispatcher(generator);

    let path = vault.drop_job("slow.md", "Think hard.");
    with_timeout(dispatcher.dispatch(&path)).await?;

    let text = vault.read(&vault.store.failed_dir().join("slow.md"));
    assert!(text.contains("**timeout**"));
    let doc = frontmatter::try_parse(&text)?;
    assert_eq!(doc.metadata.iteration(), None);
    Ok(())
}

#[tokio::test]
async fn repeated_names_do_not_overwrite_done() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let dispatcher = vault.dispatcher(FakeGenerator::new());

    for _ in 0..3 {
        let path = vault.drop_job("task.md", "again");
        with_timeout(dispatcher.dispatch(&path)).await?;
    }

    assert_eq!(vault.done(), ["task-1.md", "task-2.md", "task.md"]);
    Ok(())
}

#[tokio::test]
async fn vanished_candidate_is_skipped() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    let path = vault.store.inbox_dir().join("already-taken.md");
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    assert_eq!(outcome, DispatchOutcome::Skipped { path });
    assert!(generator.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn non_task_files_are_ignored() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    let path = vault.drop_job("image.png", "not markdown");
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    assert!(matches!(outcome, DispatchOutcome::Ignored { .. }));
    assert_eq!(vault.inbox(), ["image.png"]);
    assert!(generator.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_metadata_falls_back_to_defaults() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    let original = "---\niteration: 7\nthis line is broken\n---\nStill do it.\n";
    let path = vault.drop_job("odd.md", original);
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    assert!(matches!(outcome, DispatchOutcome::Done { iteration: 1, .. }));
    let text = vault.read(&vault.store.done_dir().join("odd.md"));
    let doc = frontmatter::try_parse(&text)?;
    assert_eq!(doc.metadata.iteration(), Some(1));
    assert!(doc.body.contains("this line is broken"));
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_goes_to_failed_untouched() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    let bytes = [0x66, 0x6f, 0xff, 0xfe, 0x6f];
    let path = vault.store.inbox_dir().join("binary.md");
    fs::write(&path, bytes)?;

    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    assert_eq!(fs::read(vault.store.failed_dir().join("binary.md"))?, bytes);
    assert!(generator.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_done_dir_escalates_to_failed() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    generator.respond("worth keeping");
    let dispatcher = vault.dispatcher(generator);

    fs::remove_dir(vault.store.done_dir())?;
    let path = vault.drop_job("task.md", "Do it.");
    let outcome = with_timeout(dispatcher.dispatch(&path)).await?;

    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    let text = vault.read(&vault.store.failed_dir().join("task.md"));
    let doc = frontmatter::try_parse(&text)?;
    assert_eq!(doc.metadata.status(), Some(TaskStatus::Failed));
    assert_eq!(doc.metadata.iteration(), None);
    assert!(doc.body.contains("> worth keeping"));
    assert!(doc.body.contains("**i/o failure**"));
    Ok(())
}

#[tokio::test]
async fn nowhere_to_go_leaves_task_in_processing() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let dispatcher = vault.dispatcher(FakeGenerator::new());

    fs::remove_dir(vault.store.done_dir())?;
    fs::remove_dir(vault.store.failed_dir())?;
    let path = vault.drop_job("stuck.md", "Do it.");

    match with_timeout(dispatcher.dispatch(&path)).await {
        Err(FamiliarError::FinalizeError { task, left_at, .. }) => {
            assert_eq!(task, "stuck.md");
            assert_eq!(left_at, vault.store.processing_dir().join("stuck.md"));
            assert!(left_at.exists());
        }
        other => panic!("expected FinalizeError, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn drain_processes_inbox_in_name_order() -> TestResult {
    init_tracing();
    let vault = VaultFixture::new();
    let generator = FakeGenerator::new();
    let dispatcher = vault.dispatcher(generator.clone());

    vault.drop_job("b.md", "second");
    vault.drop_job("a.md", "first");
    vault.drop_job("skip.txt", "ignored");

    let outcomes = with_timeout(dispatcher.drain_inbox()).await?;

    assert_eq!(outcomes.len(), 2);
    let prompts: Vec<String> = generator.calls().into_iter().map(|c| c.prompt).collect();
    assert!(prompts[0].ends_with("first"));
    assert!(prompts[1].ends_with("second"));
    assert_eq!(vault.done(), ["a.md", "b.md"]);
    assert_eq!(vault.inbox(), ["skip.txt"]);
    Ok(())
}
