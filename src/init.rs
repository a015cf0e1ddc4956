// src/init.rs

//! `familiar init`: write a config file and prepare the vault.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cli::InitArgs;
use crate::config::model::{DEFAULT_NAME, DEFAULT_TIMEOUT_SECS, DEFAULT_VAULT_PATH};
use crate::config::{load_from_path, resolve, write_config, ConfigOverrides, FamiliarConfig, RawConfig};
use crate::errors::{FamiliarError, Result};
use crate::store::TaskStore;

/// What `init` did, for the summary printed to stdout.
#[derive(Debug, Clone)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub config: FamiliarConfig,
    /// Where the generator program was found on `PATH`, if anywhere.
    pub generator_found: Option<PathBuf>,
}

/// Write the config at `config_path` and create the task directories.
///
/// An existing file is only replaced with `--force`; its values are then
/// used as the starting point so unspecified keys survive.
pub fn run_init(config_path: &Path, args: &InitArgs) -> Result<InitReport> {
    let existing = if config_path.exists() {
        if !args.force {
            return Err(FamiliarError::ConfigError(format!(
                "config already exists at {}; pass --force to overwrite it",
                config_path.display()
            )));
        }
        load_from_path(config_path)?
    } else {
        RawConfig::default()
    };

    let raw = apply_init_args(existing, args);
    // Validate before writing anything.
    let config = resolve(raw.clone(), &ConfigOverrides::default())?;

    write_config(config_path, &raw)?;
    info!(path = ?config_path, "wrote config");

    fs::create_dir_all(&config.vault_root)?;
    TaskStore::new(&config.vault_path).ensure_dirs()?;

    let generator_found = match which::which(&config.generator.program) {
        Ok(path) => Some(path),
        Err(err) => {
            warn!(
                program = %config.generator.program,
                error = %err,
                "generator not found on PATH"
            );
            None
        }
    };

    Ok(InitReport {
        config_path: config_path.to_path_buf(),
        config,
        generator_found,
    })
}

/// Overlay `init` flags on `base`, filling the core keys with defaults so
/// the written file shows them.
pub fn apply_init_args(mut base: RawConfig, args: &InitArgs) -> RawConfig {
    if let Some(name) = &args.name {
        base.name = Some(name.clone());
    }
    if let Some(path) = &args.vault_path {
        base.vault_path = Some(path.display().to_string());
    }
    if let Some(path) = &args.vault_root {
        base.vault_root = Some(path.display().to_string());
    }
    if let Some(timeout) = args.timeout {
        base.timeout = Some(timeout);
    }
    if !args.allowed_paths.is_empty() {
        base.allowed_paths = args
            .allowed_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();
    }

    base.name.get_or_insert_with(|| DEFAULT_NAME.to_string());
    base.vault_path
        .get_or_insert_with(|| DEFAULT_VAULT_PATH.to_string());
    base.timeout.get_or_insert(DEFAULT_TIMEOUT_SECS);
    base
}

pub fn print_report(report: &InitReport) {
    let cfg = &report.config;
    println!("familiar init");
    println!("  config:     {}", report.config_path.display());
    println!("  name:       {}", cfg.name);
    println!("  vault_path: {}", cfg.vault_path.display());
    println!("  vault_root: {}", cfg.vault_root.display());
    println!("  timeout:    {}s", cfg.timeout.as_secs());
    for path in &cfg.allowed_paths {
        println!("  allowed:    {}", path.display());
    }
    match &report.generator_found {
        Some(path) => println!("  generator:  {} ({})", cfg.generator.program, path.display()),
        None => println!(
            "  generator:  {} (NOT FOUND on PATH; install it before `familiar run`)",
            cfg.generator.program
        ),
    }
    println!();
    println!("Drop markdown files into {}", cfg.vault_path.join("Jobs").display());
}
