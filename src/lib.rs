// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod frontmatter;
pub mod generator;
pub mod init;
pub mod logging;
pub mod runtime;
pub mod store;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::{default_config_path, load_and_resolve, FamiliarConfig};
use crate::dispatch::Dispatcher;
use crate::errors::{FamiliarError, Result};
use crate::generator::CommandGenerator;
use crate::runtime::Runtime;
use crate::store::TaskStore;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);

    match &args.command {
        Command::Run(run_args) => run_familiar(&config_path, run_args).await,
        Command::Init(init_args) => {
            let report = init::run_init(&config_path, init_args)?;
            init::print_report(&report);
            Ok(())
        }
    }
}

/// `familiar run`.
///
/// This wires together:
/// - config loading
/// - task directories and system prompt
/// - inbox watcher
/// - dispatcher + runtime loop
/// - Ctrl-C / SIGTERM handling
async fn run_familiar(config_path: &Path, args: &RunArgs) -> Result<()> {
    if !config_path.exists() {
        return Err(FamiliarError::ConfigError(format!(
            "no config file at {}; run `familiar init` first",
            config_path.display()
        )));
    }
    let cfg = Arc::new(load_and_resolve(config_path, &args.overrides())?);

    let store = TaskStore::new(&cfg.vault_path);
    store.ensure_dirs()?;

    if args.dry_run {
        print_dry_run(&cfg, &store)?;
        return Ok(());
    }

    if !cfg.vault_root.is_dir() {
        return Err(FamiliarError::ConfigError(format!(
            "vault_root {} is not a directory",
            cfg.vault_root.display()
        )));
    }

    let system_prompt = store.load_system_prompt()?;
    if system_prompt.is_empty() {
        debug!(path = ?store.system_prompt_path(), "no system prompt");
    }

    let generator = CommandGenerator::new(&cfg.generator.program, cfg.generator.args.clone())
        .with_workdir(&cfg.vault_root);
    let dispatcher = Dispatcher::new(cfg.clone(), store.clone(), generator, system_prompt);

    info!(
        familiar = %cfg.name,
        vault = ?cfg.vault_path,
        timeout = ?cfg.timeout,
        "familiar started"
    );

    if args.once {
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        runtime::drain_until_shutdown(&dispatcher, shutdown).await?;
        return Ok(());
    }

    // Subscribe before draining so nothing dropped during the drain is missed.
    // A file seen by both is claimed once; the second attempt is a skip.
    let (watcher, candidates) = watch::spawn_watcher(&store.inbox_dir(), &cfg.watch)?;
    info!(mode = %watcher.mode(), "inbox watcher running");

    let runtime = Runtime::new(dispatcher, candidates);
    let result = runtime.run(shutdown_signal()).await;
    drop(watcher);
    result
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Print the resolved configuration and what is waiting in the inbox.
fn print_dry_run(cfg: &FamiliarConfig, store: &TaskStore) -> Result<()> {
    println!("familiar dry-run");
    println!("  name       = {}", cfg.name);
    println!("  vault_path = {}", cfg.vault_path.display());
    println!("  vault_root = {}", cfg.vault_root.display());
    println!("  timeout    = {}s", cfg.timeout.as_secs());
    println!(
        "  generator  = {} {}",
        cfg.generator.program,
        cfg.generator.args.join(" ")
    );
    println!(
        "  watch      = {} (settle {:?}, poll every {:?})",
        cfg.watch.preference, cfg.watch.settle_delay, cfg.watch.poll_interval
    );
    if !cfg.allowed_paths.is_empty() {
        println!("  allowed_paths:");
        for path in &cfg.allowed_paths {
            println!("    - {}", path.display());
        }
    }
    println!();

    let pending = store.list_inbox()?;
    println!("inbox ({}):", pending.len());
    for path in pending {
        if let Some(name) = path.file_name() {
            println!("  - {}", name.to_string_lossy());
        }
    }

    debug!("dry-run complete (nothing processed)");
    Ok(())
}
