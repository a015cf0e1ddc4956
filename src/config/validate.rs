// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{
    ConfigOverrides, FamiliarConfig, GeneratorSettings, RawConfig, WatchSettings,
    DEFAULT_NAME, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS, DEFAULT_TIMEOUT_SECS,
    DEFAULT_VAULT_PATH,
};
use crate::errors::{FamiliarError, Result};
use crate::types::WatchPreference;

impl TryFrom<RawConfig> for FamiliarConfig {
    type Error = FamiliarError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        resolve(raw, &ConfigOverrides::default())
    }
}

/// Merge built-in defaults < config file < command line, then validate.
pub fn resolve(raw: RawConfig, overrides: &ConfigOverrides) -> Result<FamiliarConfig> {
    let name = overrides
        .name
        .clone()
        .or(raw.name)
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    let vault_path = match &overrides.vault_path {
        Some(p) => expand_home(&p.to_string_lossy()),
        None => expand_home(raw.vault_path.as_deref().unwrap_or(DEFAULT_VAULT_PATH)),
    };

    let vault_root = match (&overrides.vault_root, raw.vault_root.as_deref()) {
        (Some(p), _) => expand_home(&p.to_string_lossy()),
        (None, Some(p)) => expand_home(p),
        (None, None) => default_vault_root(&vault_path),
    };

    let timeout_secs = overrides
        .timeout
        .or(raw.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let allowed_paths = raw
        .allowed_paths
        .iter()
        .map(|p| expand_home(p))
        .collect();

    let defaults = GeneratorSettings::default();
    let generator = GeneratorSettings {
        program: raw.generator.command.unwrap_or(defaults.program),
        args: raw.generator.args.unwrap_or(defaults.args),
    };

    let preference = if overrides.force_poll {
        WatchPreference::Poll
    } else {
        raw.watch.mode.unwrap_or_default()
    };
    let watch = WatchSettings {
        preference,
        settle_delay: Duration::from_millis(
            raw.watch.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
        ),
        poll_interval: Duration::from_millis(
            raw.watch.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        ),
    };

    let cfg = FamiliarConfig {
        name,
        vault_path,
        vault_root,
        timeout: Duration::from_secs(timeout_secs),
        allowed_paths,
        generator,
        watch,
    };
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Run basic semantic validation against a resolved configuration.
///
/// This checks:
/// - the name is non-empty and single-line (it ends up in run record headers)
/// - the generator command is non-empty
/// - `timeout >= 1` second
/// - settle delay and poll interval are non-zero
///
/// It does **not** check that the generator is installed; `familiar init`
/// reports that separately.
pub fn validate_config(cfg: &FamiliarConfig) -> Result<()> {
    if cfg.name.trim().is_empty() {
        return Err(FamiliarError::ConfigError("name must not be empty".into()));
    }
    if cfg.name.contains('\n') {
        return Err(FamiliarError::ConfigError(
            "name must be a single line".into(),
        ));
    }
    if cfg.generator.program.trim().is_empty() {
        return Err(FamiliarError::ConfigError(
            "[generator].command must not be empty".into(),
        ));
    }
    if cfg.timeout.is_zero() {
        return Err(FamiliarError::ConfigError(
            "timeout must be >= 1 second (got 0)".into(),
        ));
    }
    if cfg.watch.settle_delay.is_zero() {
        return Err(FamiliarError::ConfigError(
            "[watch].settle_delay_ms must be > 0".into(),
        ));
    }
    if cfg.watch.poll_interval.is_zero() {
        return Err(FamiliarError::ConfigError(
            "[watch].poll_interval_ms must be > 0".into(),
        ));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

fn default_vault_root(vault_path: &Path) -> PathBuf {
    vault_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| vault_path.to_path_buf())
}
