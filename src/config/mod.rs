// src/config/mod.rs

//! Configuration loading and validation for familiar.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load and write the config file (`loader.rs`).
//! - Merge defaults, file and command line, and validate (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_resolve, load_from_path, write_config};
pub use model::{
    ConfigOverrides, FamiliarConfig, GeneratorSection, GeneratorSettings, RawConfig,
    WatchSection, WatchSettings,
};
pub use validate::{expand_home, resolve, validate_config};
