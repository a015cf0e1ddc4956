// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigOverrides, FamiliarConfig, RawConfig};
use crate::config::validate::resolve;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; defaults and validation are
/// applied by [`load_and_resolve`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;
    debug!(?path, "loaded config file");

    Ok(config)
}

/// Load a configuration file, merge command-line overrides and validate.
pub fn load_and_resolve(
    path: impl AsRef<Path>,
    overrides: &ConfigOverrides,
) -> Result<FamiliarConfig> {
    let raw = load_from_path(path)?;
    resolve(raw, overrides)
}

/// Write `config` as TOML, creating parent directories as needed.
pub fn write_config(path: impl AsRef<Path>, config: &RawConfig) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = toml::to_string(config)?;
    fs::write(path, contents)?;
    debug!(?path, "wrote config file");
    Ok(())
}

/// `~/.config/familiar/config.toml`, or `familiar.toml` in the current
/// directory when there is no home directory.
pub fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".config").join("familiar").join("config.toml"),
        None => PathBuf::from("familiar.toml"),
    }
}
