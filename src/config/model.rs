// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::WatchPreference;

pub const DEFAULT_NAME: &str = "Familiar";
pub const DEFAULT_VAULT_PATH: &str = "~/Obsidian/Familiar";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_GENERATOR_PROGRAM: &str = "claude";
pub const DEFAULT_GENERATOR_ARGS: &[&str] = &["--print"];
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Configuration as read from (and written to) `config.toml`.
///
/// ```toml
/// name = "Familiar"
/// vault_path = "~/Obsidian/Familiar"
/// vault_root = "~/Obsidian"
/// timeout = 300
/// allowed_paths = ["~/code/notes-site"]
///
/// [generator]
/// command = "claude"
/// args = ["--print"]
///
/// [watch]
/// mode = "auto"
/// settle_delay_ms = 500
/// poll_interval_ms = 1000
/// ```
///
/// Every key is optional. Nothing here is validated; see
/// [`crate::config::resolve`] for that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawConfig {
    /// Identity used in logs, prompts and run records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Directory holding `Jobs/`, `Processing/`, `Done/`, `Failed/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_path: Option<String>,

    /// Working directory of the generator process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_root: Option<String>,

    /// Generator timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Extra directories the generator is told it may touch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_paths: Vec<String>,

    #[serde(default, skip_serializing_if = "GeneratorSection::is_empty")]
    pub generator: GeneratorSection,

    #[serde(default, skip_serializing_if = "WatchSection::is_empty")]
    pub watch: WatchSection,
}

/// `[generator]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneratorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl GeneratorSection {
    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.args.is_none()
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatchSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WatchPreference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl WatchSection {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.settle_delay_ms.is_none() && self.poll_interval_ms.is_none()
    }
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub vault_path: Option<PathBuf>,
    pub vault_root: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub force_poll: bool,
}

/// Fully resolved, validated configuration.
///
/// Built once at startup and shared read-only by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamiliarConfig {
    pub name: String,
    pub vault_path: PathBuf,
    pub vault_root: PathBuf,
    pub timeout: Duration,
    pub allowed_paths: Vec<PathBuf>,
    pub generator: GeneratorSettings,
    pub watch: WatchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_GENERATOR_PROGRAM.to_string(),
            args: DEFAULT_GENERATOR_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub preference: WatchPreference,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            preference: WatchPreference::Auto,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl FamiliarConfig {
    /// Every directory the generator may access: the vault first, then
    /// `allowed_paths`.
    pub fn access_paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.vault_path.clone())
            .chain(self.allowed_paths.iter().cloned())
            .collect()
    }
}
